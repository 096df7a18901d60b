//! # Error Taxonomy Mapper
//!
//! Centralised translation of storage faults and provider error codes into
//! the four-kind [`ErrorKind`] taxonomy.
//!
//! Both mappings are plain static tables. A fault or code that has no row
//! maps to `INTERNAL_ERROR`, so adding a new driver error never widens the
//! surface controllers have to handle.
//!
//! ## Repository table
//!
//! | Operation | Fault | Kind |
//! |-----------|-------|------|
//! | create | validation, duplicate key | INVALID_PARAMETER |
//! | retrieve | malformed id, missing | NOT_FOUND |
//! | update | malformed id, missing | NOT_FOUND |
//! | update | validation, duplicate key | INVALID_PARAMETER |
//! | delete | malformed id, missing | NOT_FOUND |
//! | queryOne | missing | NOT_FOUND |
//! | queryOne | malformed id, malformed filter | INVALID_PARAMETER |
//! | queryList | (none) | INTERNAL_ERROR |

use std::fmt;

use crate::core::errors::{AppError, ErrorKind};
use crate::db::store::{FaultClass, StoreError};

/// Repository operation a fault occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Retrieve,
    Update,
    Delete,
    QueryList,
    QueryOne,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Retrieve => "retrieve",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::QueryList => "queryList",
            Operation::QueryOne => "queryOne",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const REPOSITORY_RULES: &[(Operation, FaultClass, ErrorKind)] = &[
    (Operation::Create, FaultClass::Validation, ErrorKind::InvalidParameter),
    (Operation::Create, FaultClass::DuplicateKey, ErrorKind::InvalidParameter),
    (Operation::Retrieve, FaultClass::MalformedId, ErrorKind::NotFound),
    (Operation::Retrieve, FaultClass::Missing, ErrorKind::NotFound),
    (Operation::Update, FaultClass::MalformedId, ErrorKind::NotFound),
    (Operation::Update, FaultClass::Missing, ErrorKind::NotFound),
    (Operation::Update, FaultClass::Validation, ErrorKind::InvalidParameter),
    (Operation::Update, FaultClass::DuplicateKey, ErrorKind::InvalidParameter),
    (Operation::Delete, FaultClass::MalformedId, ErrorKind::NotFound),
    (Operation::Delete, FaultClass::Missing, ErrorKind::NotFound),
    (Operation::QueryOne, FaultClass::Missing, ErrorKind::NotFound),
    (Operation::QueryOne, FaultClass::MalformedId, ErrorKind::InvalidParameter),
    (Operation::QueryOne, FaultClass::MalformedFilter, ErrorKind::InvalidParameter),
];

/// Looks up the taxonomy kind for a storage fault.
pub fn classify_store_error(operation: Operation, error: &StoreError) -> ErrorKind {
    let class = error.class();
    REPOSITORY_RULES
        .iter()
        .find(|(op, fault, _)| *op == operation && *fault == class)
        .map(|(_, _, kind)| *kind)
        .unwrap_or(ErrorKind::InternalError)
}

/// Maps a storage fault into an [`AppError`] carrying a client-safe message.
pub fn repository_error(operation: Operation, collection: &str, error: &StoreError) -> AppError {
    let kind = classify_store_error(operation, error);
    let message = match kind {
        ErrorKind::NotFound => format!("{} document not found", collection),
        ErrorKind::InternalError => format!("{} {} failed: {}", collection, operation, error),
        _ => error.to_string(),
    };
    kind.into_error(message)
}

/// External collaborator that reported an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Cognito,
    Stripe,
    Ses,
    Vendus,
}

impl Provider {
    fn rules(self) -> &'static [(&'static str, ErrorKind)] {
        match self {
            Provider::Cognito => COGNITO_RULES,
            Provider::Stripe => STRIPE_RULES,
            Provider::Ses => SES_RULES,
            Provider::Vendus => VENDUS_RULES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Cognito => "cognito",
            Provider::Stripe => "stripe",
            Provider::Ses => "ses",
            Provider::Vendus => "vendus",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const COGNITO_RULES: &[(&str, ErrorKind)] = &[
    ("UsernameExistsException", ErrorKind::DuplicateKey),
    ("AliasExistsException", ErrorKind::DuplicateKey),
    ("UserNotFoundException", ErrorKind::NotFound),
    ("ResourceNotFoundException", ErrorKind::NotFound),
    ("InvalidParameterException", ErrorKind::InvalidParameter),
    ("InvalidPasswordException", ErrorKind::InvalidParameter),
    ("CodeMismatchException", ErrorKind::InvalidParameter),
    ("ExpiredCodeException", ErrorKind::InvalidParameter),
];

// Stripe reports both an error `code` and a coarser `type`; codes are
// checked first because callers pass them first.
const STRIPE_RULES: &[(&str, ErrorKind)] = &[
    ("resource_missing", ErrorKind::NotFound),
    ("resource_already_exists", ErrorKind::DuplicateKey),
    ("email_invalid", ErrorKind::InvalidParameter),
    ("amount_too_small", ErrorKind::InvalidParameter),
    ("parameter_missing", ErrorKind::InvalidParameter),
    ("parameter_invalid_integer", ErrorKind::InvalidParameter),
    ("card_error", ErrorKind::InvalidParameter),
    ("invalid_request_error", ErrorKind::InvalidParameter),
];

const SES_RULES: &[(&str, ErrorKind)] = &[
    ("NotFoundException", ErrorKind::NotFound),
    ("MessageRejected", ErrorKind::InvalidParameter),
    ("BadRequestException", ErrorKind::InvalidParameter),
    ("AlreadyExistsException", ErrorKind::DuplicateKey),
];

// Vendus answers with plain HTTP statuses.
const VENDUS_RULES: &[(&str, ErrorKind)] = &[
    ("404", ErrorKind::NotFound),
    ("400", ErrorKind::InvalidParameter),
    ("422", ErrorKind::InvalidParameter),
    ("409", ErrorKind::DuplicateKey),
];

/// Looks up the first of `codes` present in the provider table.
pub fn classify_provider_code(provider: Provider, codes: &[&str]) -> ErrorKind {
    let rules = provider.rules();
    codes
        .iter()
        .find_map(|code| {
            rules
                .iter()
                .find(|(known, _)| known == code)
                .map(|(_, kind)| *kind)
        })
        .unwrap_or(ErrorKind::InternalError)
}

/// Maps a provider failure into an [`AppError`].
pub fn provider_error(provider: Provider, codes: &[&str], message: impl fmt::Display) -> AppError {
    let kind = classify_provider_code(provider, codes);
    log::warn!("{} call failed ({:?} -> {}): {}", provider, codes, kind, message);
    kind.into_error(format!("{}: {}", provider, message))
}
