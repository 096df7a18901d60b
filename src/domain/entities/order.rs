//! Care order placed by a customer with a health unit.
//!
//! Status machine:
//!
//! ```text
//! pending ──► accepted ──► paid ──► completed
//!    │           │   ▲       │
//!    │           ▼   │       │
//!    │     payment_failed    │
//!    ▼           │           ▼
//! rejected   cancelled ◄─────┘
//! ```
//!
//! `cancelled` is reachable from every non-terminal state.

use std::fmt;

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::common::ensure_window;
use super::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Paid,
    PaymentFailed,
    Cancelled,
    Completed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted | Rejected | Cancelled)
                | (Accepted, Paid | PaymentFailed | Cancelled)
                | (PaymentFailed, Paid | Cancelled)
                | (Paid, Completed | Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Rejected | OrderStatus::Cancelled | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    RequiresAction,
    Succeeded,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

fn validate_weekdays(weekdays: &Vec<i32>) -> Result<(), ValidationError> {
    if weekdays.iter().all(|d| (0..=6).contains(d)) {
        Ok(())
    } else {
        Err(ValidationError::new("weekday"))
    }
}

fn validate_hour(hour: &str) -> Result<(), ValidationError> {
    let valid = hour
        .split_once(':')
        .and_then(|(h, m)| Some((h.parse::<u8>().ok()?, m.parse::<u8>().ok()?)))
        .is_some_and(|(h, m)| hour.len() == 5 && h < 24 && m < 60);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("hour"))
    }
}

fn validate_schedule(schedule: &Schedule) -> Result<(), ValidationError> {
    ensure_window(schedule.start_date, schedule.end_date)
}

/// When the care takes place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_schedule"))]
pub struct Schedule {
    pub start_date: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime>,
    /// 0 = Sunday.
    #[serde(default)]
    #[validate(custom(function = "validate_weekdays"))]
    pub weekdays: Vec<i32>,
    /// `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_hour"))]
    pub hour: Option<String>,
}

/// Amounts are in the smallest currency unit; Stripe rejects charges under 50.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[validate(range(min = 50))]
    pub amount: i64,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub status: PaymentStatus,
}

/// Invoice issued for a paid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRef {
    pub id: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub customer: ObjectId,
    pub health_unit: ObjectId,
    pub patient: ObjectId,
    pub service: ObjectId,
    #[validate(nested)]
    pub schedule: Schedule,
    pub status: OrderStatus,
    #[validate(nested)]
    pub payment: Payment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl Order {
    pub fn belongs_to_customer(&self, customer: &ObjectId) -> bool {
        self.customer == *customer
    }

    pub fn belongs_to_health_unit(&self, health_unit: &ObjectId) -> bool {
        self.health_unit == *health_unit
    }
}

impl Entity for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> Option<ObjectId> {
        self.id
    }
}
