//! Health unit: the business selling care services on the marketplace.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::{default_true, Address};
use super::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthUnitKind {
    Company,
    Individual,
}

impl HealthUnitKind {
    /// Stripe `business_type` for the connected account.
    pub fn stripe_business_type(self) -> &'static str {
        match self {
            HealthUnitKind::Company => "company",
            HealthUnitKind::Individual => "individual",
        }
    }
}

/// Aggregate of submitted reviews.
///
/// `total` is the exact sum of scores and the base of every fold;
/// `average` is derived from it, rounded to two decimals for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Rating {
    #[validate(range(min = 0.0, max = 5.0))]
    pub average: f64,
    #[validate(range(min = 0))]
    pub count: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub total: i64,
}

impl Rating {
    /// Exact sum of scores. Aggregates stored before `total` existed are
    /// reconstructed from their average.
    fn exact_total(&self) -> i64 {
        if self.total == 0 && self.count > 0 {
            (self.average * self.count as f64).round() as i64
        } else {
            self.total
        }
    }

    /// Folds one more score into the aggregate.
    pub fn with_score(&self, score: i32) -> Rating {
        let count = self.count + 1;
        let total = self.exact_total() + i64::from(score);
        Rating {
            average: (total as f64 / count as f64 * 100.0).round() / 100.0,
            count,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HealthUnit {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[validate(length(min = 1, max = 160))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
    pub kind: HealthUnitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub address: Option<Address>,
    #[serde(default)]
    pub services: Vec<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_account_id: Option<String>,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    #[validate(nested)]
    pub rating: Rating,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl HealthUnit {
    pub fn new(name: String, email: String, kind: HealthUnitKind) -> Self {
        Self {
            id: None,
            name,
            email,
            phone: None,
            kind,
            description: None,
            address: None,
            services: Vec::new(),
            stripe_account_id: None,
            charges_enabled: false,
            rating: Rating::default(),
            active: true,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn offers(&self, service: &ObjectId) -> bool {
        self.services.contains(service)
    }

    /// Whether customers can book and pay.
    pub fn accepts_orders(&self) -> bool {
        self.active && self.charges_enabled && self.stripe_account_id.is_some()
    }
}

impl Entity for HealthUnit {
    const COLLECTION: &'static str = "health_units";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email"];

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
