//! User identities (AWS Cognito user pool).
//!
//! Every marketplace account is a Cognito user placed in exactly one
//! group; the group decides which client application it can sign in to.

pub mod cognito;

pub use cognito::CognitoIdentityProvider;

use std::fmt;

use async_trait::async_trait;

use crate::core::errors::AppResult;

/// Cognito group of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserGroup {
    Admins,
    Business,
    Customers,
}

impl UserGroup {
    pub fn name(self) -> &'static str {
        match self {
            UserGroup::Admins => "admins",
            UserGroup::Business => "business",
            UserGroup::Customers => "customers",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "admins" => Some(UserGroup::Admins),
            "business" => Some(UserGroup::Business),
            "customers" => Some(UserGroup::Customers),
            _ => None,
        }
    }
}

impl fmt::Display for UserGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Administrative user operations.
///
/// Failures are already mapped through the Cognito table of
/// [`crate::core::taxonomy`]; an existing username surfaces as
/// `DUPLICATE_KEY`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the user, adds it to `group` and returns its `sub`.
    async fn create_user(&self, email: &str, name: &str, group: UserGroup) -> AppResult<String>;

    async fn delete_user(&self, email: &str) -> AppResult<()>;

    async fn add_to_group(&self, email: &str, group: UserGroup) -> AppResult<()>;
}
