use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::Result;

/// Response header carrying a freshly issued or renewed token.
pub const TOKEN_HEADER: &str = "x-jwt-token";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserClaims {
    pub uid: i64,
    /// The `User-Agent` the token was issued to; requests from any other agent are rejected.
    pub user_agent: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Duration,
    renew_threshold: Duration,
    renew_for: Duration,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            expiry: Duration::minutes(config.jwt_expiry_minutes),
            renew_threshold: Duration::seconds(config.jwt_renew_threshold_secs),
            renew_for: Duration::minutes(config.jwt_renew_minutes),
        }
    }

    pub fn issue(&self, uid: i64, user_agent: &str) -> Result<String> {
        let now = Utc::now();
        let claims = UserClaims {
            uid,
            user_agent: user_agent.to_string(),
            exp: (now + self.expiry).timestamp(),
            iat: now.timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &UserClaims) -> Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<UserClaims> {
        let data = decode::<UserClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Re-signs `claims` with a short extension when they are about to expire.
    pub fn renew_if_needed(&self, claims: &UserClaims) -> Result<Option<String>> {
        let now = Utc::now();
        if claims.exp - now.timestamp() >= self.renew_threshold.num_seconds() {
            return Ok(None);
        }

        let renewed = UserClaims {
            exp: (now + self.renew_for).timestamp(),
            ..claims.clone()
        };
        self.sign(&renewed).map(Some)
    }
}
