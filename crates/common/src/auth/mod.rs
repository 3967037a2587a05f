//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT session token issuance and validation
//! - bcrypt password hashing on the blocking pool
//! - AES-256-GCM sealing for stored API keys
//! - login lifecycle evaluation
//! - `AuthContext`, the per-request identity handlers extract

pub mod lifecycle;
pub mod password;
pub mod secrets;
pub mod token;

pub use lifecycle::{evaluate_login, LoginDenial, SubscriptionState};
pub use password::{hash_password, verify_password};
pub use secrets::{is_unchanged_mask, mask_key, SecretBox};
pub use token::{SessionClaims, TokenService};

use crate::errors::{AppError, Result};
use crate::rbac::{self, Permission, Role};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

/// Identity attached to a request after token validation.
///
/// The authentication middleware builds one of these from the session claims
/// and inserts it into request extensions; handlers receive it as an
/// extractor. Permission checks read only this struct, never the database.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID from the token subject
    pub user_id: Uuid,

    /// Tenant the request operates in. `None` only for platform accounts
    /// that have not bound a tenant via the X-Tenant-ID header.
    pub tenant_id: Option<Uuid>,

    /// Email from the session claims
    pub email: String,

    /// Role the token was issued for
    pub role: Role,

    /// Platform-level account flag
    pub is_super_admin: bool,
}

impl AuthContext {
    /// Check whether this identity holds a permission
    pub fn permits(&self, permission: Permission) -> bool {
        self.is_super_admin || rbac::permits(self.role, permission)
    }

    /// Require a permission, returning the denied permission and role on failure
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.permits(permission) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied {
                required: permission,
                role: self.role,
            })
        }
    }

    /// Require that the request is bound to a tenant
    pub fn require_tenant(&self) -> Result<Uuid> {
        self.tenant_id.ok_or_else(|| AppError::Forbidden {
            message: "Request is not bound to a tenant".to_string(),
        })
    }

    /// Require one of an allow-list of roles; super admins always pass
    pub fn require_any_role(&self, allowed: &[Role]) -> Result<()> {
        if self.is_super_admin || allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Role not permitted for this operation".to_string(),
            })
        }
    }
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role, is_super_admin: bool) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            email: "user@example.com".to_string(),
            role,
            is_super_admin,
        }
    }

    #[test]
    fn test_permits_follows_role_grants() {
        let analyst = ctx(Role::ComplianceAnalyst, false);
        assert!(analyst.permits(Permission::RegopsView));
        assert!(analyst.permits(Permission::RegopsCreate));
        assert!(!analyst.permits(Permission::RegopsDelete));
        assert!(!analyst.permits(Permission::AdminUsers));
    }

    #[test]
    fn test_super_admin_flag_overrides_role() {
        let admin = ctx(Role::RegularUser, true);
        assert!(admin.permits(Permission::RegopsDelete));
        assert!(admin.permits(Permission::AdminSettings));
    }

    #[test]
    fn test_require_reports_permission_and_role() {
        let user = ctx(Role::RegularUser, false);
        match user.require(Permission::RiskopsApprove) {
            Err(AppError::PermissionDenied { required, role }) => {
                assert_eq!(required, Permission::RiskopsApprove);
                assert_eq!(role, Role::RegularUser);
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_require_tenant() {
        let mut platform = ctx(Role::SuperAdmin, true);
        platform.tenant_id = None;
        assert!(platform.require_tenant().is_err());

        let bound = ctx(Role::TenantAdmin, false);
        assert_eq!(bound.require_tenant().unwrap(), bound.tenant_id.unwrap());
    }

    #[test]
    fn test_require_any_role() {
        let officer = ctx(Role::ComplianceOfficer, false);
        assert!(officer
            .require_any_role(&[Role::TenantAdmin, Role::ComplianceOfficer])
            .is_ok());
        assert!(officer.require_any_role(&[Role::TenantAdmin]).is_err());

        let admin = ctx(Role::RegularUser, true);
        assert!(admin.require_any_role(&[Role::TenantAdmin]).is_ok());
    }
}
