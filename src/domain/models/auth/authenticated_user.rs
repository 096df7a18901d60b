use std::future::{ready, Ready};

use actix_web::{FromRequest, HttpMessage, HttpRequest};

use super::client::ClientKind;
use crate::core::errors::AppError;

/// Caller identity placed in the request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Cognito `sub`.
    pub sub: String,
    pub email: Option<String>,
    /// `cognito:groups`
    pub groups: Vec<String>,
    /// Client application the request came through.
    pub client: ClientKind,
}

impl AuthenticatedUser {
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn is_admin(&self) -> bool {
        self.client == ClientKind::Admin
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(AppError::AuthenticationError(
                "Authentication required".to_string(),
            ))),
        }
    }
}
