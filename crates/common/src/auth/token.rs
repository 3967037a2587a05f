//! Session token issue and validation
//!
//! Tokens are stateless HS256 JWTs carrying the principal's identity,
//! tenant binding, role, and super-admin flag. Validation never consults
//! a store; rotation of the signing secret invalidates every session.

use crate::errors::{AppError, Result};
use crate::rbac::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Typed session claims. Unknown or missing fields fail validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Tenant ID; absent for super-admin principals
    pub tenant_id: Option<String>,

    pub email: String,

    pub role: Role,

    pub is_super_admin: bool,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Unauthorized {
            message: "Invalid session token".to_string(),
        })
    }

    pub fn tenant_uuid(&self) -> Result<Option<Uuid>> {
        match &self.tenant_id {
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| AppError::Unauthorized {
                    message: "Invalid session token".to_string(),
                }),
            None => Ok(None),
        }
    }
}

/// Issues and validates session tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, issuer: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            ttl_secs: ttl_secs as i64,
        }
    }

    /// Issue a session token for an authenticated principal
    pub fn issue(
        &self,
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        email: &str,
        role: Role,
        is_super_admin: bool,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl_secs);

        let claims = SessionClaims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.map(|t| t.to_string()),
            email: email.to_string(),
            role,
            is_super_admin,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to sign token: {}", e),
        })
    }

    /// Validate a bearer token and decode its claims
    pub fn validate(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid session token".to_string(),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test_secret", "tenon", 86400)
    }

    #[test]
    fn test_token_roundtrip() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let token = svc
            .issue(user_id, Some(tenant_id), "a@x.io", Role::TenantAdmin, false)
            .unwrap();
        let claims = svc.validate(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.tenant_uuid().unwrap(), Some(tenant_id));
        assert_eq!(claims.email, "a@x.io");
        assert_eq!(claims.role, Role::TenantAdmin);
        assert!(!claims.is_super_admin);
        assert_eq!(claims.iss, "tenon");
    }

    #[test]
    fn test_super_admin_without_tenant() {
        let svc = service();
        let token = svc
            .issue(Uuid::new_v4(), None, "root@x.io", Role::SuperAdmin, true)
            .unwrap();
        let claims = svc.validate(&token).unwrap();

        assert_eq!(claims.tenant_uuid().unwrap(), None);
        assert!(claims.is_super_admin);
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = service();
        let now = Utc::now();
        let claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            tenant_id: None,
            email: "a@x.io".into(),
            role: Role::RegularUser,
            is_super_admin: false,
            iss: "tenon".into(),
            iat: (now - Duration::hours(25)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        assert!(matches!(svc.validate(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let svc = service();
        let other = TokenService::new("different_secret", "tenon", 86400);
        let token = other
            .issue(Uuid::new_v4(), None, "a@x.io", Role::RegularUser, false)
            .unwrap();

        assert!(svc.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let svc = service();
        let imposter = TokenService::new("test_secret", "someone_else", 86400);
        let token = imposter
            .issue(Uuid::new_v4(), None, "a@x.io", Role::RegularUser, false)
            .unwrap();

        assert!(svc.validate(&token).is_err());
    }
}
