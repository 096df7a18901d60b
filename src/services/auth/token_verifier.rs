//! Cognito token verification.
//!
//! Tokens are issued by the user pool and signed with RS256; the public
//! keys come from the pool's JWKS endpoint and are cached by `kid`. An
//! unknown `kid` triggers one refresh of the key set, which covers key
//! rotation. Refreshes are spaced at least [`JWKS_MIN_REFRESH`] apart, so
//! tokens with made-up `kid`s cannot drive traffic to the endpoint.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::CognitoConfig;
use crate::core::errors::{AppError, AppResult};

/// Claims read from Cognito access and id tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CognitoClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "cognito:groups", default)]
    pub groups: Vec<String>,
    /// Access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Id tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
}

impl CognitoClaims {
    /// App client the token was issued to.
    pub fn app_client(&self) -> Option<&str> {
        self.client_id.as_deref().or(self.aud.as_deref())
    }
}

/// Minimum time between two JWKS fetches.
pub const JWKS_MIN_REFRESH: Duration = Duration::from_secs(60);

#[derive(Default)]
struct JwksCache {
    keys: HashMap<String, DecodingKey>,
    last_fetch: Option<Instant>,
}

impl JwksCache {
    fn may_fetch(&self, now: Instant) -> bool {
        match self.last_fetch {
            Some(at) => now.saturating_duration_since(at) >= JWKS_MIN_REFRESH,
            None => true,
        }
    }
}

enum KeySource {
    Jwks {
        url: String,
        http: reqwest::Client,
        cache: RwLock<JwksCache>,
    },
    Secret(DecodingKey),
}

pub struct TokenVerifier {
    source: KeySource,
    issuer: String,
    algorithm: Algorithm,
}

impl TokenVerifier {
    pub fn new(jwks_url: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            source: KeySource::Jwks {
                url: jwks_url.into(),
                http: reqwest::Client::new(),
                cache: RwLock::new(JwksCache::default()),
            },
            issuer: issuer.into(),
            algorithm: Algorithm::RS256,
        }
    }

    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(CognitoConfig::jwks_url()?, CognitoConfig::issuer()?))
    }

    /// HS256 verifier with a shared secret, for tests and local tooling.
    pub fn with_secret(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            source: KeySource::Secret(DecodingKey::from_secret(secret)),
            issuer: issuer.into(),
            algorithm: Algorithm::HS256,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub async fn verify(&self, token: &str) -> AppResult<CognitoClaims> {
        let header = decode_header(token).map_err(|_| invalid_token())?;
        if header.alg != self.algorithm {
            return Err(invalid_token());
        }

        let key = match &self.source {
            KeySource::Secret(key) => key.clone(),
            KeySource::Jwks { .. } => {
                let kid = header.kid.ok_or_else(invalid_token)?;
                self.key_for(&kid).await?
            }
        };

        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // client ids are matched against x-client-id by the middleware
        validation.validate_aud = false;

        decode::<CognitoClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::AuthenticationError("Token has expired".to_string())
                }
                _ => {
                    log::debug!("Token rejected: {}", e);
                    invalid_token()
                }
            })
    }

    async fn key_for(&self, kid: &str) -> AppResult<DecodingKey> {
        let KeySource::Jwks { url, http, cache } = &self.source else {
            return Err(invalid_token());
        };

        if let Some(key) = read_cache(cache)?.keys.get(kid) {
            return Ok(key.clone());
        }
        {
            let mut cache = write_cache(cache)?;
            if let Some(key) = cache.keys.get(kid) {
                return Ok(key.clone());
            }
            let now = Instant::now();
            if !cache.may_fetch(now) {
                log::debug!("Unknown kid {}; JWKS refreshed less than {:?} ago", kid, JWKS_MIN_REFRESH);
                return Err(invalid_token());
            }
            cache.last_fetch = Some(now);
        }

        log::info!("Refreshing JWKS from {}", url);
        let set: JwkSet = http
            .get(url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::InternalError(format!("JWKS request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::InternalError(format!("JWKS response unreadable: {}", e)))?;

        let fresh = decoding_keys(&set);
        let key = fresh.get(kid).cloned();
        write_cache(cache)?.keys = fresh;

        key.ok_or_else(invalid_token)
    }
}

fn read_cache(cache: &RwLock<JwksCache>) -> AppResult<std::sync::RwLockReadGuard<'_, JwksCache>> {
    cache
        .read()
        .map_err(|_| AppError::InternalError("JWKS cache poisoned".to_string()))
}

fn write_cache(cache: &RwLock<JwksCache>) -> AppResult<std::sync::RwLockWriteGuard<'_, JwksCache>> {
    cache
        .write()
        .map_err(|_| AppError::InternalError("JWKS cache poisoned".to_string()))
}

/// Keys of the set that carry a `kid` and decode cleanly.
fn decoding_keys(set: &JwkSet) -> HashMap<String, DecodingKey> {
    set.keys
        .iter()
        .filter_map(|jwk| {
            let kid = jwk.common.key_id.clone()?;
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => Some((kid, key)),
                Err(e) => {
                    log::warn!("Skipping JWK {}: {}", kid, e);
                    None
                }
            }
        })
        .collect()
}

fn invalid_token() -> AppError {
    AppError::AuthenticationError("Invalid token".to_string())
}

/// Token part of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(auth_header: &str) -> AppResult<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::AuthenticationError("Malformed Authorization header".to_string()))
}
