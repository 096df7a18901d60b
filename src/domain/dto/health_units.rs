use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::{Address, Collaborator, HealthUnit, HealthUnitKind};
use crate::utils::string_utils::deserialize_optional_string;

/// Public registration of a health unit and its first (admin) collaborator.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OnboardRequest {
    #[validate(length(min = 1, max = 160, message = "name must be 1-160 characters"))]
    pub name: String,

    /// Business email; also the admin's sign-in.
    #[validate(email(message = "a valid email address is required"))]
    pub email: String,

    pub kind: HealthUnitKind,

    #[validate(length(min = 1, max = 120, message = "adminName must be 1-120 characters"))]
    pub admin_name: String,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub address: Option<Address>,

    /// Catalogue service ids.
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHealthUnitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 160))]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub address: Option<Address>,

    /// Replaces the offered services; converted to ids by the service.
    #[serde(default, skip_serializing)]
    pub services: Option<Vec<String>>,
}

/// `?service=<id>` on the public listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthUnitFilter {
    pub service: Option<String>,
}

/// Result of an onboarding. `onboarding_url` is absent when Stripe could
/// not produce the link; it can be requested again later.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Onboarded {
    pub health_unit: HealthUnit,
    pub collaborator: Collaborator,
    pub onboarding_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingLink {
    pub url: String,
}
