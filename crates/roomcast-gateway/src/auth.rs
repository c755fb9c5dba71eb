//! Bearer credential handling for the WebSocket upgrade.
//!
//! The token comes from a cookie (browsers) or, as a fallback, a query
//! parameter (non-browser clients). Verification is behind `TokenVerifier`
//! so the gateway does not care who issued the token.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use roomcast_core::error::{Result, RoomcastError};

/// Verified identity of a connecting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal>;
}

/// Access token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "sub")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Expiry (Unix timestamp, seconds).
    pub exp: u64,
}

/// HS256 verifier sharing a secret with the token issuer.
#[derive(Clone)]
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Issue a token for `user_id`. Used by tooling and tests; production
    /// tokens are minted by the auth service.
    pub fn issue(&self, user_id: &str, ttl: Duration) -> Result<String> {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RoomcastError::Internal(format!("clock before epoch: {e}")))?
            .saturating_add(ttl)
            .as_secs();

        let claims = Claims {
            user_id: user_id.to_string(),
            email: None,
            device_id: None,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| RoomcastError::Internal(format!("token encode failed: {e}")))
    }

    pub fn decode_claims(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| RoomcastError::AuthFailed(e.to_string()))
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal> {
        let claims = self.decode_claims(token)?;
        if claims.user_id.is_empty() {
            return Err(RoomcastError::AuthFailed("empty user id".into()));
        }
        Ok(Principal {
            user_id: claims.user_id,
        })
    }
}

/// Pull the bearer token from the request: cookie first, query parameter second.
pub fn extract_token(
    headers: &HeaderMap,
    query: &HashMap<String, String>,
    cookie_name: &str,
    query_param: &str,
) -> Option<String> {
    cookie_value(headers, cookie_name).or_else(|| {
        query
            .get(query_param)
            .filter(|v| !v.is_empty())
            .cloned()
    })
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn cookie_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=from-cookie"),
        );
        let q = query(&[("token", "from-query")]);
        assert_eq!(
            extract_token(&headers, &q, "access_token", "token").as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn query_is_fallback() {
        let headers = HeaderMap::new();
        let q = query(&[("token", "from-query")]);
        assert_eq!(
            extract_token(&headers, &q, "access_token", "token").as_deref(),
            Some("from-query")
        );
    }

    #[test]
    fn empty_values_count_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        let q = query(&[("token", "")]);
        assert_eq!(extract_token(&headers, &q, "access_token", "token"), None);
    }

    #[tokio::test]
    async fn issued_token_verifies() {
        let jwt = JwtVerifier::new("test-secret");
        let token = jwt.issue("user-7", Duration::from_secs(60)).unwrap();
        let principal = jwt.verify(&token).await.unwrap();
        assert_eq!(principal.user_id, "user-7");
    }

    #[tokio::test]
    async fn foreign_or_garbage_token_is_rejected() {
        let ours = JwtVerifier::new("test-secret");
        let theirs = JwtVerifier::new("other-secret");
        let token = theirs.issue("user-7", Duration::from_secs(60)).unwrap();

        let err = ours.verify(&token).await.unwrap_err();
        assert_eq!(err.client_code().as_str(), "AUTH_FAILED");

        let err = ours.verify("not-a-jwt").await.unwrap_err();
        assert_eq!(err.client_code().as_str(), "AUTH_FAILED");
    }
}
