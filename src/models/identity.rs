//! Identities issued by the external auth provider

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display data the provider attaches to a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// JWT claims as issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: IdentityMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl IdentityClaims {
    pub fn new(sub: Uuid, email: Option<String>, full_name: Option<String>, ttl_hours: i64) -> Self {
        let now = chrono::Utc::now();
        Self {
            sub,
            email,
            user_metadata: IdentityMetadata {
                full_name,
                avatar_url: None,
            },
            aud: None,
            exp: (now + chrono::Duration::hours(ttl_hours)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Sign the claims (HS256). The provider does this in production; used by tooling and tests.
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Verify and decode a token
    pub fn from_token(
        token: &str,
        secret: &str,
        audience: Option<&str>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let mut validation = Validation::default();
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )?;
        Ok(token_data.claims)
    }
}

/// The signed-in user, passed explicitly to every service call that needs one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Name shown to other users: provider name, else the local part of the email
    pub fn display_name(&self) -> Option<String> {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
            })
            .map(str::to_string)
    }
}

impl From<IdentityClaims> for Identity {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            full_name: claims.user_metadata.full_name,
            avatar_url: claims.user_metadata.avatar_url,
        }
    }
}
