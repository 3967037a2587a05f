//! Platform administration handlers
//!
//! Everything here sits behind the super-admin route gate. Tenant
//! lifecycle transitions, user management, billing, analytics, and the
//! audit log. Status and role inputs are matched against the closed
//! vocabularies explicitly; an unknown value is a validation error, never
//! a silent default.

use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tenon_common::auth::AuthContext;
use tenon_common::cache::keys;
use tenon_common::db::models::{
    AuditEntry, BillingCycle, Subscription, SubscriptionStatus, Tenant, User, UserStatus,
};
use tenon_common::db::{PlatformStats, SubscriptionPatch};
use tenon_common::errors::{AppError, Result};
use tenon_common::metrics::record_cache;
use tenon_common::rbac::Role;
use uuid::Uuid;

const ANALYTICS_TTL_SECS: u64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantView {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<Tenant> for TenantView {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            domain: tenant.domain,
            status: tenant.status,
            created_at: tenant.created_at.into(),
            updated_at: tenant.updated_at.into(),
            deleted_at: tenant.deleted_at.map(Into::into),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub plan: String,
    pub status: String,
    pub billing_cycle: String,
    pub price_cents: i64,
    pub currency: String,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionView {
    fn from(subscription: Subscription) -> Self {
        Self {
            id: subscription.id,
            tenant_id: subscription.tenant_id,
            plan: subscription.plan,
            status: subscription.status,
            billing_cycle: subscription.billing_cycle,
            price_cents: subscription.price_cents,
            currency: subscription.currency,
            start_date: subscription.start_date.into(),
            end_date: subscription.end_date.map(Into::into),
            created_at: subscription.created_at.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDetail {
    #[serde(flatten)]
    pub tenant: TenantView,
    pub subscription: Option<SubscriptionView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub status: String,
    pub is_super_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            status: user.status,
            is_super_admin: user.is_super_admin,
            last_login_at: user.last_login_at.map(Into::into),
            created_at: user.created_at.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingRow {
    #[serde(flatten)]
    pub subscription: SubscriptionView,
    pub tenant_name: Option<String>,
    pub tenant_domain: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogView {
    pub id: i64,
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub target: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<AuditEntry> for LogView {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            tenant_id: entry.tenant_id,
            actor_id: entry.actor_id,
            action: entry.action,
            target: entry.target,
            detail: entry.detail,
            created_at: entry.created_at.into(),
        }
    }
}

async fn invalidate_analytics(state: &AppState) {
    if let Some(cache) = &state.cache {
        cache.delete(&keys::platform_stats()).await.ok();
    }
}

// ============================================================================
// Tenants
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TenantListQuery {
    pub include_deleted: Option<bool>,
}

/// GET /api/platform/tenants
pub async fn list_tenants(
    State(state): State<AppState>,
    Query(query): Query<TenantListQuery>,
) -> Result<Json<Vec<TenantView>>> {
    let tenants = state
        .repo
        .list_tenants(query.include_deleted.unwrap_or(false))
        .await?;

    Ok(Json(tenants.into_iter().map(Into::into).collect()))
}

/// GET /api/platform/tenants/deleted
pub async fn list_deleted_tenants(
    State(state): State<AppState>,
) -> Result<Json<Vec<TenantView>>> {
    let tenants = state.repo.list_deleted_tenants().await?;
    Ok(Json(tenants.into_iter().map(Into::into).collect()))
}

/// GET /api/platform/tenants/{id}
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantDetail>> {
    let tenant = state
        .repo
        .find_tenant(id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound { id: id.to_string() })?;
    let subscription = state.repo.find_subscription(id).await?;

    Ok(Json(TenantDetail {
        tenant: tenant.into(),
        subscription: subscription.map(Into::into),
    }))
}

/// POST /api/platform/tenants/{id}/activate
pub async fn activate_tenant(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantView>> {
    let tenant = state.repo.activate_tenant(id, auth.user_id).await?;
    invalidate_analytics(&state).await;
    tracing::info!(tenant_id = %id, "Tenant activated");

    Ok(Json(tenant.into()))
}

/// POST /api/platform/tenants/{id}/suspend
pub async fn suspend_tenant(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantView>> {
    let tenant = state.repo.suspend_tenant(id, auth.user_id).await?;
    invalidate_analytics(&state).await;
    tracing::info!(tenant_id = %id, "Tenant suspended");

    Ok(Json(tenant.into()))
}

/// POST /api/platform/tenants/{id}/reactivate
pub async fn reactivate_tenant(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantView>> {
    let tenant = state.repo.reactivate_tenant(id, auth.user_id).await?;
    invalidate_analytics(&state).await;
    tracing::info!(tenant_id = %id, "Tenant reactivated");

    Ok(Json(tenant.into()))
}

/// DELETE /api/platform/tenants/{id} (soft)
pub async fn soft_delete_tenant(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantView>> {
    let tenant = state.repo.soft_delete_tenant(id, auth.user_id).await?;
    invalidate_analytics(&state).await;
    tracing::info!(tenant_id = %id, "Tenant soft-deleted");

    Ok(Json(tenant.into()))
}

/// POST /api/platform/tenants/{id}/restore
pub async fn restore_tenant(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantView>> {
    let tenant = state.repo.restore_tenant(id, auth.user_id).await?;
    invalidate_analytics(&state).await;
    tracing::info!(tenant_id = %id, "Tenant restored");

    Ok(Json(tenant.into()))
}

/// DELETE /api/platform/tenants/{id}/permanent
pub async fn purge_tenant(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.repo.purge_tenant(id, auth.user_id).await?;
    invalidate_analytics(&state).await;
    tracing::info!(tenant_id = %id, "Tenant permanently deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub tenant_id: Option<Uuid>,
}

/// GET /api/platform/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserView>>> {
    let users = state.repo.list_users(query.tenant_id).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

/// PUT /api/platform/users/{id}/role
pub async fn set_user_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<UserView>> {
    let role = Role::from_str(&payload.role).map_err(|_| AppError::Validation {
        message: format!("Unknown role: {}", payload.role),
        field: Some("role".to_string()),
    })?;

    let user = state.repo.set_user_role(id, role, auth.user_id).await?;
    tracing::info!(user_id = %id, role = %role, "User role changed");

    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// PUT /api/platform/users/{id}/status
pub async fn set_user_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<Json<UserView>> {
    let status = match payload.status.as_str() {
        "active" => UserStatus::Active,
        "suspended" => UserStatus::Suspended,
        other => {
            return Err(AppError::Validation {
                message: format!("Unknown status: {}", other),
                field: Some("status".to_string()),
            })
        }
    };

    let user = state.repo.set_user_status(id, status, auth.user_id).await?;
    invalidate_analytics(&state).await;
    tracing::info!(user_id = %id, status = %payload.status, "User status changed");

    Ok(Json(user.into()))
}

// ============================================================================
// Analytics
// ============================================================================

/// GET /api/platform/analytics
pub async fn analytics(State(state): State<AppState>) -> Result<Json<PlatformStats>> {
    let key = keys::platform_stats();
    if let Some(cache) = &state.cache {
        if let Ok(Some(stats)) = cache.get::<PlatformStats>(&key).await {
            record_cache(true, "platform_stats");
            return Ok(Json(stats));
        }
        record_cache(false, "platform_stats");
    }

    let stats = state.repo.platform_stats().await?;
    if let Some(cache) = &state.cache {
        cache.set_with_ttl(&key, &stats, ANALYTICS_TTL_SECS).await.ok();
    }

    Ok(Json(stats))
}

// ============================================================================
// Billing
// ============================================================================

/// GET /api/platform/billing
pub async fn list_billing(State(state): State<AppState>) -> Result<Json<Vec<BillingRow>>> {
    let rows = state.repo.list_subscriptions().await?;

    Ok(Json(
        rows.into_iter()
            .map(|(subscription, tenant)| BillingRow {
                subscription: subscription.into(),
                tenant_name: tenant.as_ref().map(|t| t.name.clone()),
                tenant_domain: tenant.map(|t| t.domain),
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBillingRequest {
    pub plan: Option<String>,
    pub status: Option<String>,
    pub billing_cycle: Option<String>,
    pub price_cents: Option<i64>,
}

fn billing_patch(payload: UpdateBillingRequest) -> Result<SubscriptionPatch> {
    let status = match payload.status.as_deref() {
        None => None,
        Some("pending") => Some(SubscriptionStatus::Pending),
        Some("active") => Some(SubscriptionStatus::Active),
        Some("cancelled") => Some(SubscriptionStatus::Cancelled),
        Some("expired") => Some(SubscriptionStatus::Expired),
        Some(other) => {
            return Err(AppError::Validation {
                message: format!("Unknown subscription status: {}", other),
                field: Some("status".to_string()),
            })
        }
    };

    let billing_cycle = match payload.billing_cycle.as_deref() {
        None => None,
        Some("monthly") => Some(BillingCycle::Monthly),
        Some("annual") => Some(BillingCycle::Annual),
        Some(other) => {
            return Err(AppError::Validation {
                message: format!("Unknown billing cycle: {}", other),
                field: Some("billingCycle".to_string()),
            })
        }
    };

    if let Some(price_cents) = payload.price_cents {
        if price_cents < 0 {
            return Err(AppError::Validation {
                message: "Price cannot be negative".to_string(),
                field: Some("priceCents".to_string()),
            });
        }
    }

    if let Some(plan) = payload.plan.as_deref() {
        if plan.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Plan cannot be empty".to_string(),
                field: Some("plan".to_string()),
            });
        }
    }

    Ok(SubscriptionPatch {
        plan: payload.plan,
        status,
        billing_cycle,
        price_cents: payload.price_cents,
    })
}

/// PUT /api/platform/billing/{tenant_id}
pub async fn update_billing(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<UpdateBillingRequest>,
) -> Result<Json<SubscriptionView>> {
    let patch = billing_patch(payload)?;
    let subscription = state
        .repo
        .update_subscription(tenant_id, patch, auth.user_id)
        .await?;

    tracing::info!(%tenant_id, "Subscription updated");

    Ok(Json(subscription.into()))
}

// ============================================================================
// Audit Log
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub tenant_id: Option<Uuid>,
    /// Action prefix, e.g. `login.` or `tenant.`
    pub action: Option<String>,
    pub limit: Option<u64>,
}

/// GET /api/platform/logs
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogView>>> {
    let entries = state
        .repo
        .list_audit(
            query.tenant_id,
            query.action.as_deref(),
            query.limit.unwrap_or(100).min(500),
        )
        .await?;

    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        status: Option<&str>,
        cycle: Option<&str>,
        price_cents: Option<i64>,
    ) -> UpdateBillingRequest {
        UpdateBillingRequest {
            plan: None,
            status: status.map(String::from),
            billing_cycle: cycle.map(String::from),
            price_cents,
        }
    }

    #[test]
    fn billing_patch_accepts_known_vocabulary() {
        let patch = billing_patch(request(Some("active"), Some("annual"), Some(49900))).unwrap();
        assert_eq!(patch.status, Some(SubscriptionStatus::Active));
        assert_eq!(patch.billing_cycle, Some(BillingCycle::Annual));
        assert_eq!(patch.price_cents, Some(49900));
    }

    #[test]
    fn billing_patch_rejects_unknown_status() {
        let err = billing_patch(request(Some("archived"), None, None)).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn billing_patch_rejects_negative_price() {
        let err = billing_patch(request(None, None, Some(-1))).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn billing_patch_passes_through_empty_request() {
        let patch = billing_patch(request(None, None, None)).unwrap();
        assert!(patch.plan.is_none());
        assert!(patch.status.is_none());
        assert!(patch.billing_cycle.is_none());
        assert!(patch.price_cents.is_none());
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Role::from_str("grand_vizier").is_err());
        assert_eq!(Role::from_str("risk_manager"), Ok(Role::RiskManager));
    }
}
