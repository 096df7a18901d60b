use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::Address;
use crate::utils::string_utils::deserialize_optional_string;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,

    #[validate(email(message = "a valid email address is required"))]
    pub email: String,

    #[serde(default, deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 6, max = 20, message = "phone must be 6-20 characters"))]
    pub phone: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub address: Option<Address>,
}

/// Profile changes; the email is owned by Cognito and cannot change here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_string")]
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub address: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_validation() {
        let request: SignUpRequest =
            serde_json::from_str(r#"{"name": "Ana Silva", "email": "ana@x.pt", "phone": " "}"#).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.phone, None);

        let request: SignUpRequest =
            serde_json::from_str(r#"{"name": "", "email": "not-an-email"}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("email"));
    }
}
