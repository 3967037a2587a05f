//! Authentication middleware
//!
//! Validates the bearer token, resolves the tenant the request operates in,
//! and attaches an `AuthContext` to request extensions. Tenant resolution:
//! the session claim is authoritative; the `X-Tenant-ID` header can rebind
//! the request, but only super admins may bind a tenant other than their
//! claim. Everything downstream reads the context, never the token.

use crate::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tenon_common::auth::AuthContext;
use tenon_common::errors::AppError;
use uuid::Uuid;

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validate the session token and attach an `AuthContext`
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or_else(|| AppError::Unauthorized {
        message: "Authentication required".to_string(),
    })?;

    let claims = state.tokens.validate(token)?;
    let user_id = claims.user_id()?;
    let claim_tenant = claims.tenant_uuid()?;

    let tenant_id = match header_tenant(request.headers(), &state.config.auth.tenant_header)? {
        Some(requested) => {
            if claims.is_super_admin {
                // Platform accounts may operate inside any tenant
                Some(requested)
            } else if claim_tenant == Some(requested) {
                claim_tenant
            } else {
                return Err(AppError::TenantMismatch);
            }
        }
        None => claim_tenant,
    };

    let context = AuthContext {
        user_id,
        tenant_id,
        email: claims.email,
        role: claims.role,
        is_super_admin: claims.is_super_admin,
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Parse the tenant override header, if present
fn header_tenant(headers: &HeaderMap, header_name: &str) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = headers.get(header_name) else {
        return Ok(None);
    };

    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::InvalidFormat {
            message: format!("{} header is not a valid UUID", header_name),
        })
}

/// Gate for platform routes; runs after `authenticate`
pub async fn require_super_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let auth = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| AppError::Unauthorized {
            message: "Authentication required".to_string(),
        })?;

    if !auth.is_super_admin {
        return Err(AppError::Forbidden {
            message: "Super admin access required".to_string(),
        });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_token_missing_or_malformed() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_header_tenant_parses_uuid() {
        let tenant = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-tenant-id",
            HeaderValue::from_str(&tenant.to_string()).unwrap(),
        );
        assert_eq!(
            header_tenant(&headers, "X-Tenant-ID").unwrap(),
            Some(tenant)
        );
    }

    #[test]
    fn test_header_tenant_rejects_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            header_tenant(&headers, "X-Tenant-ID"),
            Err(AppError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_header_tenant_absent() {
        assert_eq!(header_tenant(&HeaderMap::new(), "X-Tenant-ID").unwrap(), None);
    }
}
