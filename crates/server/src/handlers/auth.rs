//! Authentication handlers
//!
//! Login runs the full lifecycle gate after the password check: user
//! status, tenant status, subscription term. Every attempt against a known
//! account leaves an audit entry; the wire response for a denial is always
//! 401 with the gate-specific message.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use tenon_common::auth::{
    evaluate_login, hash_password, verify_password, AuthContext, LoginDenial, SubscriptionState,
};
use tenon_common::db::models::{BillingCycle, User};
use tenon_common::db::TenantRegistration;
use tenon_common::errors::{AppError, Result};
use tenon_common::metrics::{record_login, record_registration};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: ProfileView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub tenant_id: Option<Uuid>,
    pub is_super_admin: bool,
}

impl From<User> for ProfileView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            tenant_id: user.tenant_id,
            is_super_admin: user.is_super_admin,
        }
    }
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let Some(user) = state.repo.find_user_by_email(&payload.email).await? else {
        record_login(false);
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&payload.password, &user.password_hash).await? {
        deny_login(&state, &user, "invalid_credentials").await?;
        return Err(AppError::InvalidCredentials);
    }

    // A role outside the catalog grants nothing, so the account cannot
    // open a session
    let Some(role) = user.parsed_role() else {
        deny_login(&state, &user, "unknown_role").await?;
        return Err(LoginDenial::UserInactive.into());
    };

    let tenant = match user.tenant_id {
        Some(tenant_id) => state.repo.find_tenant(tenant_id).await?,
        None => None,
    };
    let tenant_status = tenant.as_ref().map(|t| t.tenant_status());

    let subscription = match (user.is_super_admin, user.tenant_id) {
        (false, Some(tenant_id)) => state
            .repo
            .find_subscription(tenant_id)
            .await?
            .map(|sub| SubscriptionState {
                status: sub.subscription_status(),
                end_date: sub.end_date.map(Into::into),
            }),
        _ => None,
    };

    if let Err(denial) = evaluate_login(
        user.user_status(),
        user.is_super_admin,
        tenant_status,
        subscription,
        chrono::Utc::now(),
    ) {
        deny_login(&state, &user, denial.message()).await?;
        return Err(denial.into());
    }

    state.repo.update_last_login(user.id).await?;
    state
        .repo
        .record_audit(
            user.tenant_id,
            Some(user.id),
            "login.succeeded",
            format!("user:{}", user.id),
            json!({ "email": user.email.clone() }),
        )
        .await?;
    record_login(true);

    let token = state.tokens.issue(
        user.id,
        user.tenant_id,
        &user.email,
        role,
        user.is_super_admin,
    )?;

    tracing::info!(user_id = %user.id, role = %role, "Login succeeded");

    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

async fn deny_login(state: &AppState, user: &User, reason: &str) -> Result<()> {
    state
        .repo
        .record_audit(
            user.tenant_id,
            Some(user.id),
            "login.denied",
            format!("user:{}", user.id),
            json!({ "reason": reason }),
        )
        .await?;
    record_login(false);
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    /// Optional; derived from the company name when absent
    pub domain: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub admin_email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[serde(default = "default_plan")]
    pub plan: String,
    pub billing_cycle: Option<String>,
}

fn default_plan() -> String {
    "standard".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub pending: bool,
    pub tenant_id: Uuid,
    pub message: &'static str,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let domain = match payload.domain.as_deref().map(str::trim) {
        Some(domain) if !domain.is_empty() => domain.to_lowercase(),
        _ => slugify_domain(&payload.company_name),
    };
    if domain.is_empty() {
        return Err(AppError::Validation {
            message: "Unable to derive a domain from the company name".to_string(),
            field: Some("domain".to_string()),
        });
    }

    let billing_cycle = payload
        .billing_cycle
        .map(BillingCycle::from)
        .unwrap_or(BillingCycle::Monthly);

    let password_hash = hash_password(&payload.password).await?;

    let registered = state
        .repo
        .register_tenant(TenantRegistration {
            company_name: payload.company_name,
            domain,
            admin_email: payload.admin_email,
            password_hash,
            first_name: payload.first_name,
            last_name: payload.last_name,
            plan: payload.plan,
            billing_cycle,
        })
        .await?;

    record_registration();
    tracing::info!(
        tenant_id = %registered.tenant.id,
        domain = %registered.tenant.domain,
        "Tenant registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            pending: true,
            tenant_id: registered.tenant.id,
            message: "Registration received. A platform administrator must activate the tenant before login.",
        }),
    ))
}

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

/// Lowercase the name and collapse everything outside `[a-z0-9]` into
/// single hyphens
fn slugify_domain(name: &str) -> String {
    let re = SLUG_RE.get_or_init(|| Regex::new("[^a-z0-9]+").unwrap());
    re.replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> Result<Json<ProfileView>> {
    let user = state
        .repo
        .find_user(auth.user_id)
        .await?
        .filter(|user| user.deleted_at.is_none())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Account no longer exists".to_string(),
        })?;

    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let user = state
        .repo
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized {
            message: "Account no longer exists".to_string(),
        })?;

    if !verify_password(&payload.current_password, &user.password_hash).await? {
        return Err(AppError::Unauthorized {
            message: "Current password is incorrect".to_string(),
        });
    }

    let password_hash = hash_password(&payload.new_password).await?;
    state.repo.set_user_password(user.id, password_hash).await?;
    state
        .repo
        .record_audit(
            user.tenant_id,
            Some(user.id),
            "user.password_changed",
            format!("user:{}", user.id),
            json!({}),
        )
        .await?;

    tracing::info!(user_id = %user.id, "Password changed");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            company_name: "Acme Corp".to_string(),
            domain: None,
            admin_email: "admin@acme.io".to_string(),
            password: "correct-horse-battery".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            plan: default_plan(),
            billing_cycle: None,
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            admin_email: "not-an-email".to_string(),
            ..valid
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_short_password_rejected() {
        let request = RegisterRequest {
            company_name: "Acme Corp".to_string(),
            domain: None,
            admin_email: "admin@acme.io".to_string(),
            password: "short".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            plan: default_plan(),
            billing_cycle: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_slugify_domain() {
        assert_eq!(slugify_domain("Acme Corp"), "acme-corp");
        assert_eq!(slugify_domain("  Émile & Fils!  "), "mile-fils");
        assert_eq!(slugify_domain("already-a-slug"), "already-a-slug");
        assert_eq!(slugify_domain("***"), "");
    }
}
