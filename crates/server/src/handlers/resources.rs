//! Tenant-scoped resource handlers
//!
//! One handler set serves every family in the catalog; the URL carries the
//! area (via router extension) and the family slug. Permissions derive from
//! the area and the operation: list/get/stats take view, create takes
//! create, update and workflow actions take edit (approve/reject take
//! approve), and the whole recycle-bin surface takes delete.
//!
//! Every mutation writes its audit entry inside the same tenant scope, so
//! record and trail commit or roll back together.

use crate::handlers::ai::resolve_provider;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tenon_common::ai::ChatMessage;
use tenon_common::auth::AuthContext;
use tenon_common::cache::keys;
use tenon_common::db::resources::{
    ResourceAction, ResourceDraft, ResourceKind, ResourcePatch, ResourceRecord, ResourceStats,
    ResourceStore,
};
use tenon_common::db::{Repository, TenantScope};
use tenon_common::errors::{AppError, Result};
use tenon_common::metrics::{record_ai, record_cache, record_write};
use tenon_common::rbac::{self, Area, Verb};
use uuid::Uuid;
use validator::Validate;

const STATS_TTL_SECS: u64 = 60;

fn resolve_family(area: Area, family: &str) -> Result<ResourceKind> {
    ResourceKind::from_slug(area, family).ok_or_else(|| AppError::NotFound {
        resource: "resource family".to_string(),
        id: family.to_string(),
    })
}

async fn invalidate_stats(state: &AppState, tenant_id: Uuid, kind: ResourceKind) {
    if let Some(cache) = &state.cache {
        cache
            .delete(&keys::resource_stats(tenant_id, kind.slug()))
            .await
            .ok();
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListQuery {
    fn limit(&self) -> u64 {
        self.limit.unwrap_or(50).min(200)
    }

    fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

/// GET /api/{area}/{family}
pub async fn list_records(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path(family): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ResourceRecord>>> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::View))?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let records = ResourceStore::new(&scope, kind)
        .list(query.status.as_deref(), query.limit(), query.offset())
        .await?;
    scope.commit().await?;

    Ok(Json(records))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordRequest {
    #[validate(length(min = 1, max = 500, message = "Title is required"))]
    pub title: String,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub owner: Option<String>,
    pub details: Option<serde_json::Value>,
}

/// POST /api/{area}/{family}
pub async fn create_record(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path(family): Path<String>,
    Json(payload): Json<CreateRecordRequest>,
) -> Result<(StatusCode, Json<ResourceRecord>)> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::Create))?;
    let tenant_id = auth.require_tenant()?;

    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let record = ResourceStore::new(&scope, kind)
        .create(ResourceDraft {
            title: payload.title,
            status: payload.status,
            severity: payload.severity,
            owner: payload.owner,
            details: payload.details.unwrap_or_else(|| json!({})),
        })
        .await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "resource.created",
        format!("{}:{}", kind.slug(), record.id),
        json!({ "title": record.title.as_str() }),
    )
    .await?;
    scope.commit().await?;

    invalidate_stats(&state, tenant_id, kind).await;
    record_write(kind.slug(), "create");
    tracing::info!(family = kind.slug(), id = %record.id, "Record created");

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/{area}/{family}/{id}
pub async fn get_record(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path((family, id)): Path<(String, Uuid)>,
) -> Result<Json<ResourceRecord>> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::View))?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let record = ResourceStore::new(&scope, kind).get(id).await?;
    scope.commit().await?;

    Ok(Json(record))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecordRequest {
    #[validate(length(min = 1, max = 500, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub owner: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl UpdateRecordRequest {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.severity.is_some() {
            fields.push("severity");
        }
        if self.owner.is_some() {
            fields.push("owner");
        }
        if self.details.is_some() {
            fields.push("details");
        }
        fields
    }
}

/// PUT /api/{area}/{family}/{id}
pub async fn update_record(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path((family, id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateRecordRequest>,
) -> Result<Json<ResourceRecord>> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::Edit))?;
    let tenant_id = auth.require_tenant()?;

    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let changed = payload.changed_fields();
    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let record = ResourceStore::new(&scope, kind)
        .update(
            id,
            ResourcePatch {
                title: payload.title,
                status: payload.status,
                severity: payload.severity,
                owner: payload.owner,
                details: payload.details,
            },
        )
        .await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "resource.updated",
        format!("{}:{}", kind.slug(), id),
        json!({ "fields": changed }),
    )
    .await?;
    scope.commit().await?;

    invalidate_stats(&state, tenant_id, kind).await;
    record_write(kind.slug(), "update");

    Ok(Json(record))
}

/// DELETE /api/{area}/{family}/{id} (soft)
pub async fn delete_record(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path((family, id)): Path<(String, Uuid)>,
) -> Result<Json<serde_json::Value>> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::Delete))?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    ResourceStore::new(&scope, kind)
        .soft_delete(id, auth.user_id)
        .await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "resource.deleted",
        format!("{}:{}", kind.slug(), id),
        json!({}),
    )
    .await?;
    scope.commit().await?;

    invalidate_stats(&state, tenant_id, kind).await;
    record_write(kind.slug(), "delete");
    tracing::info!(family = kind.slug(), %id, "Record soft-deleted");

    Ok(Json(json!({ "deleted": true })))
}

/// GET /api/{area}/{family}/deleted
pub async fn list_deleted_records(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path(family): Path<String>,
) -> Result<Json<Vec<ResourceRecord>>> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::View))?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let records = ResourceStore::new(&scope, kind).list_deleted().await?;
    scope.commit().await?;

    Ok(Json(records))
}

/// POST /api/{area}/{family}/{id}/restore
pub async fn restore_record(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path((family, id)): Path<(String, Uuid)>,
) -> Result<Json<ResourceRecord>> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::Delete))?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let record = ResourceStore::new(&scope, kind).restore(id).await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "resource.restored",
        format!("{}:{}", kind.slug(), id),
        json!({}),
    )
    .await?;
    scope.commit().await?;

    invalidate_stats(&state, tenant_id, kind).await;
    record_write(kind.slug(), "restore");

    Ok(Json(record))
}

/// DELETE /api/{area}/{family}/{id}/permanent
pub async fn purge_record(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path((family, id)): Path<(String, Uuid)>,
) -> Result<StatusCode> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::Delete))?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    ResourceStore::new(&scope, kind).purge(id).await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "resource.purged",
        format!("{}:{}", kind.slug(), id),
        json!({}),
    )
    .await?;
    scope.commit().await?;

    invalidate_stats(&state, tenant_id, kind).await;
    record_write(kind.slug(), "purge");
    tracing::info!(family = kind.slug(), %id, "Record permanently deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/{area}/{family}/stats
pub async fn record_stats(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path(family): Path<String>,
) -> Result<Json<ResourceStats>> {
    let kind = resolve_family(area, &family)?;
    auth.require(area.permission(Verb::View))?;
    let tenant_id = auth.require_tenant()?;

    let key = keys::resource_stats(tenant_id, kind.slug());
    if let Some(cache) = &state.cache {
        if let Ok(Some(stats)) = cache.get::<ResourceStats>(&key).await {
            record_cache(true, "resource_stats");
            return Ok(Json(stats));
        }
        record_cache(false, "resource_stats");
    }

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let stats = ResourceStore::new(&scope, kind).stats().await?;
    scope.commit().await?;

    if let Some(cache) = &state.cache {
        cache.set_with_ttl(&key, &stats, STATS_TTL_SECS).await.ok();
    }

    Ok(Json(stats))
}

/// POST /api/{area}/{family}/{id}/{action}
///
/// Workflow transitions declared per family. `generate` on reports calls
/// the AI provider and stores the output in the record's details before
/// moving it to `generated`.
pub async fn run_action(
    State(state): State<AppState>,
    Extension(area): Extension<Area>,
    auth: AuthContext,
    Path((family, id, action)): Path<(String, Uuid, String)>,
) -> Result<Json<ResourceRecord>> {
    let kind = resolve_family(area, &family)?;
    let action = ResourceAction::from_slug(&action)
        .filter(|action| kind.supports(*action))
        .ok_or_else(|| AppError::Validation {
            message: format!("Unsupported action '{}' for {}", action, kind.slug()),
            field: None,
        })?;

    if !auth.is_super_admin && !rbac::has_area_access(auth.role, area) {
        return Err(AppError::Forbidden {
            message: format!("No access to the {} domain", area),
        });
    }
    auth.require(area.permission(action.required_verb()))?;
    let tenant_id = auth.require_tenant()?;

    let record = if action == ResourceAction::Generate {
        generate_report(&state, &auth, tenant_id, kind, id).await?
    } else {
        let scope = TenantScope::begin(&state.db, tenant_id).await?;
        let record = ResourceStore::new(&scope, kind).apply_action(id, action).await?;
        Repository::record_audit_in(
            scope.conn(),
            Some(tenant_id),
            Some(auth.user_id),
            "resource.action",
            format!("{}:{}", kind.slug(), id),
            json!({ "action": action.slug(), "status": record.status.as_str() }),
        )
        .await?;
        scope.commit().await?;
        record
    };

    invalidate_stats(&state, tenant_id, kind).await;
    record_write(kind.slug(), "action");
    tracing::info!(
        family = kind.slug(),
        %id,
        action = action.slug(),
        "Workflow action applied"
    );

    Ok(Json(record))
}

/// Produce report content with the AI provider, then store it and move the
/// record to `generated`. The provider call happens between two scopes so
/// no transaction is held across the network round-trip; the content write,
/// status change, and audit entry still commit together.
async fn generate_report(
    state: &AppState,
    auth: &AuthContext,
    tenant_id: Uuid,
    kind: ResourceKind,
    id: Uuid,
) -> Result<ResourceRecord> {
    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let record = ResourceStore::new(&scope, kind).get(id).await?;
    scope.commit().await?;

    let provider = resolve_provider(state, tenant_id).await?;
    let messages = [
        ChatMessage::system(
            "You are a compliance reporting assistant. Write a clear, structured \
             report in Markdown based on the request.",
        ),
        ChatMessage::user(format!(
            "Generate the report titled {:?}. Parameters: {}",
            record.title, record.details
        )),
    ];

    let started = Instant::now();
    let result = provider.chat(&messages).await;
    record_ai(started.elapsed().as_secs_f64(), "chat", result.is_ok());
    let content = result?;

    let mut details = record.details;
    if let Some(map) = details.as_object_mut() {
        map.insert("generatedContent".to_string(), json!(content));
        map.insert(
            "generatedAt".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
    } else {
        details = json!({
            "generatedContent": content,
            "generatedAt": chrono::Utc::now().to_rfc3339(),
        });
    }

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let record = ResourceStore::new(&scope, kind)
        .update(
            id,
            ResourcePatch {
                status: Some(ResourceAction::Generate.resulting_status().to_string()),
                details: Some(details),
                ..Default::default()
            },
        )
        .await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "resource.action",
        format!("{}:{}", kind.slug(), id),
        json!({ "action": "generate", "status": record.status.as_str() }),
    )
    .await?;
    scope.commit().await?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults_and_caps() {
        let query = ListQuery {
            status: None,
            limit: None,
            offset: None,
        };
        assert_eq!(query.limit(), 50);
        assert_eq!(query.offset(), 0);

        let query = ListQuery {
            status: None,
            limit: Some(10_000),
            offset: Some(30),
        };
        assert_eq!(query.limit(), 200);
        assert_eq!(query.offset(), 30);
    }

    #[test]
    fn test_resolve_family_is_area_scoped() {
        assert!(resolve_family(Area::Regops, "policies").is_ok());
        assert!(matches!(
            resolve_family(Area::Regops, "risk-register"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_changed_fields() {
        let payload = UpdateRecordRequest {
            title: Some("New title".to_string()),
            status: None,
            severity: Some("high".to_string()),
            owner: None,
            details: None,
        };
        assert_eq!(payload.changed_fields(), vec!["title", "severity"]);
    }

    #[test]
    fn test_create_request_requires_title() {
        let payload = CreateRecordRequest {
            title: String::new(),
            status: None,
            severity: None,
            owner: None,
            details: None,
        };
        assert!(payload.validate().is_err());
    }
}
