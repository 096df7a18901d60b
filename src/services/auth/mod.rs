//! Bearer token verification against the Cognito user pool.

pub mod token_verifier;

pub use token_verifier::{extract_bearer_token, CognitoClaims, TokenVerifier};
