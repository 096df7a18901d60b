//! Cognito adapter over the admin user APIs.

use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::error::ProvideErrorMetadata;
use aws_sdk_cognitoidentityprovider::types::AttributeType;
use aws_sdk_cognitoidentityprovider::Client;

use super::{IdentityProvider, UserGroup};
use crate::config::{AwsConfig, CognitoConfig};
use crate::core::errors::{AppError, AppResult};
use crate::core::taxonomy::{provider_error, Provider};

fn cognito_error(operation: &str, error: impl ProvideErrorMetadata) -> AppError {
    let code = error.code().unwrap_or_default();
    let message = error.message().unwrap_or("no message");
    provider_error(Provider::Cognito, &[code], format!("{} failed: {}", operation, message))
}

fn attribute(name: &str, value: &str) -> AppResult<AttributeType> {
    AttributeType::builder()
        .name(name)
        .value(value)
        .build()
        .map_err(|e| AppError::InternalError(format!("Invalid Cognito attribute {}: {}", name, e)))
}

pub struct CognitoIdentityProvider {
    client: Client,
    user_pool_id: String,
}

impl CognitoIdentityProvider {
    pub fn new(client: Client, user_pool_id: String) -> Self {
        Self { client, user_pool_id }
    }

    /// Client for `COGNITO_USER_POOL_ID` in `AWS_REGION`.
    pub async fn from_env() -> AppResult<Self> {
        let user_pool_id = CognitoConfig::user_pool_id()?;
        let shared = AwsConfig::load().await;
        Ok(Self::new(Client::new(&shared), user_pool_id))
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn create_user(&self, email: &str, name: &str, group: UserGroup) -> AppResult<String> {
        let output = self
            .client
            .admin_create_user()
            .user_pool_id(&self.user_pool_id)
            .username(email)
            .user_attributes(attribute("email", email)?)
            .user_attributes(attribute("email_verified", "true")?)
            .user_attributes(attribute("name", name)?)
            .send()
            .await
            .map_err(|e| cognito_error("AdminCreateUser", e))?;

        let user = output
            .user()
            .ok_or_else(|| AppError::InternalError("AdminCreateUser returned no user".to_string()))?;
        let sub = user
            .attributes()
            .iter()
            .find(|a| a.name() == "sub")
            .and_then(|a| a.value())
            .or_else(|| user.username())
            .ok_or_else(|| AppError::InternalError("Cognito user has no sub".to_string()))?
            .to_string();

        log::info!("Cognito user created: {} ({})", email, sub);

        // a user outside its group cannot sign in to any client, so undo
        if let Err(error) = self.add_to_group(email, group).await {
            log::warn!("Removing Cognito user {} after group assignment failed", email);
            if let Err(cleanup) = self.delete_user(email).await {
                log::error!("Cognito cleanup of {} failed: {}", email, cleanup);
            }
            return Err(error);
        }

        Ok(sub)
    }

    async fn delete_user(&self, email: &str) -> AppResult<()> {
        self.client
            .admin_delete_user()
            .user_pool_id(&self.user_pool_id)
            .username(email)
            .send()
            .await
            .map_err(|e| cognito_error("AdminDeleteUser", e))?;

        log::info!("Cognito user deleted: {}", email);
        Ok(())
    }

    async fn add_to_group(&self, email: &str, group: UserGroup) -> AppResult<()> {
        self.client
            .admin_add_user_to_group()
            .user_pool_id(&self.user_pool_id)
            .username(email)
            .group_name(group.name())
            .send()
            .await
            .map_err(|e| cognito_error("AdminAddUserToGroup", e))?;

        log::debug!("Cognito user {} added to {}", email, group);
        Ok(())
    }
}
