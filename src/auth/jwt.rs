//! Local verification of HS256 access tokens signed with the identity provider's shared secret.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::Identity;
use crate::ports::{IdentityError, IdentityVerifier};

const DEFAULT_AUDIENCE: &str = "authenticated";
const LEEWAY_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    email: Option<String>,
}

#[derive(Clone)]
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_audience(&[DEFAULT_AUDIENCE]);

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        match audience {
            Some(aud) => {
                self.validation.validate_aud = true;
                self.validation.set_audience(&[aud]);
            }
            None => {
                self.validation.validate_aud = false;
                self.validation.aud = None;
            }
        }
        self
    }

    pub fn decode(&self, token: &str) -> Result<Identity, IdentityError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => IdentityError::Malformed(e.to_string()),
                _ => IdentityError::Rejected,
            }
        })?;

        // Anonymous keys are signed with the same secret but carry no user subject.
        let user_id = data
            .claims
            .sub
            .as_deref()
            .and_then(|sub| Uuid::parse_str(sub).ok())
            .ok_or(IdentityError::Rejected)?;

        Ok(Identity {
            user_id,
            email: data.claims.email,
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError> {
        self.decode(credential)
    }
}
