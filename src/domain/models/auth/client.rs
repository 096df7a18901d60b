//! Client applications allowed to call the API.
//!
//! Each frontend (back-office, business dashboard, marketplace) is a
//! separate Cognito app client and sends its id in `x-client-id`.

use std::collections::HashMap;
use std::fmt;

use crate::config::CognitoConfig;
use crate::services::identity::UserGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Admin,
    Business,
    Marketplace,
}

impl ClientKind {
    /// Cognito group a user must belong to when signing in through this client.
    pub fn group(self) -> UserGroup {
        match self {
            ClientKind::Admin => UserGroup::Admins,
            ClientKind::Business => UserGroup::Business,
            ClientKind::Marketplace => UserGroup::Customers,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClientKind::Admin => "admin",
            ClientKind::Business => "business",
            ClientKind::Marketplace => "marketplace",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// App client id → client kind.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientKind>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client_id: impl Into<String>, kind: ClientKind) -> Self {
        self.clients.insert(client_id.into(), kind);
        self
    }

    /// Reads `ADMIN_CLIENT_ID`, `BUSINESS_CLIENT_ID` and `MARKETPLACE_CLIENT_ID`.
    /// Unset clients are simply not registered.
    pub fn from_env() -> Self {
        let mut registry = Self::new();
        let configured = [
            (CognitoConfig::admin_client_id(), ClientKind::Admin),
            (CognitoConfig::business_client_id(), ClientKind::Business),
            (CognitoConfig::marketplace_client_id(), ClientKind::Marketplace),
        ];
        for (id, kind) in configured {
            match id {
                Some(id) => registry = registry.with_client(id, kind),
                None => log::warn!("No app client configured for {} requests", kind),
            }
        }
        registry
    }

    pub fn kind_of(&self, client_id: &str) -> Option<ClientKind> {
        self.clients.get(client_id).copied()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = ClientRegistry::new()
            .with_client("admin-app", ClientKind::Admin)
            .with_client("shop-app", ClientKind::Marketplace);

        assert_eq!(registry.kind_of("admin-app"), Some(ClientKind::Admin));
        assert_eq!(registry.kind_of("shop-app"), Some(ClientKind::Marketplace));
        assert_eq!(registry.kind_of("unknown"), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_client_groups() {
        assert_eq!(ClientKind::Admin.group(), UserGroup::Admins);
        assert_eq!(ClientKind::Business.group(), UserGroup::Business);
        assert_eq!(ClientKind::Marketplace.group(), UserGroup::Customers);
    }
}
