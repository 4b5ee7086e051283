//! Bearer token verification.
//!
//! Tokens are HS256 JWTs carrying the subject id and a role. Issuance lives
//! with whoever owns customer sign-in; [`JwtVerifier::issue`] exists for
//! `fk-cli token issue` and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use forkful_core::ports::{AuthenticatedSubject, IdentityVerifier};
use forkful_core::{CommerceError, SubjectId, SubjectRole};

use crate::config::TokenConfig;

/// Token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject id
    pub sub: String,
    #[serde(default)]
    pub role: SubjectRole,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// HS256 bearer token verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            issuer: config.issuer.clone(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Mint a token for `subject` valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the token cannot be encoded.
    pub fn issue(
        &self,
        subject: &SubjectId,
        role: SubjectRole,
        ttl: Duration,
    ) -> Result<String, CommerceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| CommerceError::invalid_argument(format!("cannot encode token: {e}")))
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> Result<AuthenticatedSubject, CommerceError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(credential.trim(), &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    CommerceError::unauthenticated("token has expired")
                }
                _ => CommerceError::unauthenticated("invalid token"),
            })?;

        let id = SubjectId::parse(&token_data.claims.sub)
            .map_err(|_| CommerceError::unauthenticated("token has no subject"))?;

        Ok(AuthenticatedSubject {
            id,
            role: token_data.claims.role,
        })
    }
}
