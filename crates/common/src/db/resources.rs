//! Tenant resource families and the envelope store
//!
//! Every GRC resource family shares one table shape and one set of
//! operations, so a single generic implementation serves all of them.
//! `ResourceKind` is the catalog entry (URL slug, backing table, owning
//! area, workflow actions); `ResourceStore` runs the SQL against a
//! `TenantScope`, where unqualified table names resolve into the tenant's
//! schema through the transaction-local search_path.

use crate::db::TenantScope;
use crate::errors::{AppError, Result};
use crate::rbac::{Area, Verb};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DbBackend, QueryResult, Statement};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use uuid::Uuid;

/// The resource families served by the tenant-scoped CRUD pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Regulations,
    Policies,
    Controls,
    Evidence,
    DataInventory,
    Ropa,
    Dsr,
    Dpia,
    PrivacyControls,
    Incidents,
    RiskRegister,
    Vulnerabilities,
    Vendors,
    Continuity,
    Kris,
    InternalAudits,
    ControlTests,
    Reports,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 18] = [
        ResourceKind::Regulations,
        ResourceKind::Policies,
        ResourceKind::Controls,
        ResourceKind::Evidence,
        ResourceKind::DataInventory,
        ResourceKind::Ropa,
        ResourceKind::Dsr,
        ResourceKind::Dpia,
        ResourceKind::PrivacyControls,
        ResourceKind::Incidents,
        ResourceKind::RiskRegister,
        ResourceKind::Vulnerabilities,
        ResourceKind::Vendors,
        ResourceKind::Continuity,
        ResourceKind::Kris,
        ResourceKind::InternalAudits,
        ResourceKind::ControlTests,
        ResourceKind::Reports,
    ];

    /// Path segment under `/api/<area>/`
    pub fn slug(self) -> &'static str {
        match self {
            ResourceKind::Regulations => "regulations",
            ResourceKind::Policies => "policies",
            ResourceKind::Controls => "controls",
            ResourceKind::Evidence => "evidence",
            ResourceKind::DataInventory => "data-inventory",
            ResourceKind::Ropa => "ropa",
            ResourceKind::Dsr => "dsr",
            ResourceKind::Dpia => "dpia",
            ResourceKind::PrivacyControls => "privacy-controls",
            ResourceKind::Incidents => "incidents",
            ResourceKind::RiskRegister => "risk-register",
            ResourceKind::Vulnerabilities => "vulnerabilities",
            ResourceKind::Vendors => "vendors",
            ResourceKind::Continuity => "continuity",
            ResourceKind::Kris => "kris",
            ResourceKind::InternalAudits => "internal-audits",
            ResourceKind::ControlTests => "control-tests",
            ResourceKind::Reports => "reports",
        }
    }

    /// Backing table inside the tenant schema
    pub fn table(self) -> &'static str {
        match self {
            ResourceKind::Regulations => "regulations",
            ResourceKind::Policies => "policies",
            ResourceKind::Controls => "controls",
            ResourceKind::Evidence => "evidence",
            ResourceKind::DataInventory => "data_inventory",
            ResourceKind::Ropa => "ropa_records",
            ResourceKind::Dsr => "dsr_requests",
            ResourceKind::Dpia => "dpia_assessments",
            ResourceKind::PrivacyControls => "privacy_controls",
            ResourceKind::Incidents => "incidents",
            ResourceKind::RiskRegister => "risk_register",
            ResourceKind::Vulnerabilities => "vulnerabilities",
            ResourceKind::Vendors => "vendor_assessments",
            ResourceKind::Continuity => "business_continuity",
            ResourceKind::Kris => "kris",
            ResourceKind::InternalAudits => "audit_plans",
            ResourceKind::ControlTests => "control_tests",
            ResourceKind::Reports => "reports",
        }
    }

    /// Functional area owning this family
    pub fn area(self) -> Area {
        match self {
            ResourceKind::Regulations
            | ResourceKind::Policies
            | ResourceKind::Controls
            | ResourceKind::Evidence => Area::Regops,

            ResourceKind::DataInventory
            | ResourceKind::Ropa
            | ResourceKind::Dsr
            | ResourceKind::Dpia
            | ResourceKind::PrivacyControls
            | ResourceKind::Incidents => Area::Privacyops,

            ResourceKind::RiskRegister
            | ResourceKind::Vulnerabilities
            | ResourceKind::Vendors
            | ResourceKind::Continuity
            | ResourceKind::Kris => Area::Riskops,

            ResourceKind::InternalAudits
            | ResourceKind::ControlTests
            | ResourceKind::Reports => Area::Auditops,
        }
    }

    /// Workflow actions this family declares
    pub fn actions(self) -> &'static [ResourceAction] {
        use ResourceAction::*;
        match self {
            ResourceKind::Policies | ResourceKind::Ropa | ResourceKind::Dpia
            | ResourceKind::Vendors => &[Approve, Reject],
            ResourceKind::Controls => &[Approve, Reject, Test],
            ResourceKind::Dsr | ResourceKind::Incidents | ResourceKind::Vulnerabilities => {
                &[Resolve, Close]
            }
            ResourceKind::PrivacyControls | ResourceKind::Continuity => &[Test],
            ResourceKind::RiskRegister => &[Close],
            ResourceKind::InternalAudits => &[Run, Close],
            ResourceKind::ControlTests => &[Run],
            ResourceKind::Reports => &[Generate],
            ResourceKind::Regulations
            | ResourceKind::Evidence
            | ResourceKind::DataInventory
            | ResourceKind::Kris => &[],
        }
    }

    pub fn supports(self, action: ResourceAction) -> bool {
        self.actions().contains(&action)
    }

    /// Resolve a URL slug within an area
    pub fn from_slug(area: Area, slug: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.area() == area && kind.slug() == slug)
    }
}

/// Status transitions a family may declare on `POST /{id}/{action}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Approve,
    Reject,
    Resolve,
    Close,
    Run,
    Test,
    Generate,
}

impl ResourceAction {
    pub const ALL: [ResourceAction; 7] = [
        ResourceAction::Approve,
        ResourceAction::Reject,
        ResourceAction::Resolve,
        ResourceAction::Close,
        ResourceAction::Run,
        ResourceAction::Test,
        ResourceAction::Generate,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ResourceAction::Approve => "approve",
            ResourceAction::Reject => "reject",
            ResourceAction::Resolve => "resolve",
            ResourceAction::Close => "close",
            ResourceAction::Run => "run",
            ResourceAction::Test => "test",
            ResourceAction::Generate => "generate",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.slug() == slug)
    }

    /// Status the record takes after the action
    pub fn resulting_status(self) -> &'static str {
        match self {
            ResourceAction::Approve => "approved",
            ResourceAction::Reject => "rejected",
            ResourceAction::Resolve => "resolved",
            ResourceAction::Close => "closed",
            ResourceAction::Run => "in_progress",
            ResourceAction::Test => "tested",
            ResourceAction::Generate => "generated",
        }
    }

    /// Permission verb gating the action. Approval decisions need the
    /// area's approve grant; operational transitions ride on edit.
    pub fn required_verb(self) -> Verb {
        match self {
            ResourceAction::Approve | ResourceAction::Reject => Verb::Approve,
            _ => Verb::Edit,
        }
    }
}

/// One record in the uniform envelope shape
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub details: Json,
    pub is_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted on create
#[derive(Debug, Clone)]
pub struct ResourceDraft {
    pub title: String,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub owner: Option<String>,
    pub details: Json,
}

/// Fields accepted on update; absent fields keep their stored value
#[derive(Debug, Clone, Default)]
pub struct ResourcePatch {
    pub title: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub owner: Option<String>,
    pub details: Option<Json>,
}

/// Counts for `GET /stats`; deserializable so it can round-trip through
/// the response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub by_severity: HashMap<String, i64>,
}

const RECORD_COLUMNS: &str =
    "id, title, status, severity, owner, details, is_deleted, deleted_at, created_at, updated_at";

fn record_from_row(row: &QueryResult) -> Result<ResourceRecord> {
    Ok(ResourceRecord {
        id: row.try_get("", "id")?,
        title: row.try_get("", "title")?,
        status: row.try_get("", "status")?,
        severity: row.try_get("", "severity")?,
        owner: row.try_get("", "owner")?,
        details: row.try_get("", "details")?,
        is_deleted: row.try_get("", "is_deleted")?,
        deleted_at: row.try_get("", "deleted_at")?,
        created_at: row.try_get("", "created_at")?,
        updated_at: row.try_get("", "updated_at")?,
    })
}

/// CRUD over one family's table inside a tenant scope.
///
/// Table names come from the static `ResourceKind` catalog, never from
/// request input, so interpolating them into SQL is safe.
pub struct ResourceStore<'a> {
    scope: &'a TenantScope,
    kind: ResourceKind,
}

impl<'a> ResourceStore<'a> {
    pub fn new(scope: &'a TenantScope, kind: ResourceKind) -> Self {
        Self { scope, kind }
    }

    fn not_found(&self, id: Uuid) -> AppError {
        AppError::NotFound {
            resource: self.kind.slug().to_string(),
            id: id.to_string(),
        }
    }

    /// List live records, newest first, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<ResourceRecord>> {
        let table = self.kind.table();
        let (sql, values) = match status {
            Some(status) => (
                format!(
                    "SELECT {RECORD_COLUMNS} FROM {table} \
                     WHERE is_deleted = FALSE AND status = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3"
                ),
                vec![
                    status.into(),
                    (limit as i64).into(),
                    (offset as i64).into(),
                ],
            ),
            None => (
                format!(
                    "SELECT {RECORD_COLUMNS} FROM {table} \
                     WHERE is_deleted = FALSE \
                     ORDER BY created_at DESC LIMIT $1 OFFSET $2"
                ),
                vec![(limit as i64).into(), (offset as i64).into()],
            ),
        };

        let rows = self
            .scope
            .conn()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values,
            ))
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// List the recycle bin, most recently deleted first
    pub async fn list_deleted(&self) -> Result<Vec<ResourceRecord>> {
        let table = self.kind.table();
        let rows = self
            .scope
            .conn()
            .query_all(Statement::from_string(
                DbBackend::Postgres,
                format!(
                    "SELECT {RECORD_COLUMNS} FROM {table} \
                     WHERE is_deleted = TRUE ORDER BY deleted_at DESC"
                ),
            ))
            .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Fetch one live record
    pub async fn get(&self, id: Uuid) -> Result<ResourceRecord> {
        let table = self.kind.table();
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!(
                    "SELECT {RECORD_COLUMNS} FROM {table} \
                     WHERE id = $1 AND is_deleted = FALSE"
                ),
                vec![id.into()],
            ))
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(self.not_found(id)),
        }
    }

    /// Insert a new record
    pub async fn create(&self, draft: ResourceDraft) -> Result<ResourceRecord> {
        let table = self.kind.table();
        let status = draft.status.as_deref().unwrap_or("draft");
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!(
                    "INSERT INTO {table} (title, status, severity, owner, details) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING {RECORD_COLUMNS}"
                ),
                vec![
                    draft.title.into(),
                    status.into(),
                    draft.severity.into(),
                    draft.owner.into(),
                    draft.details.into(),
                ],
            ))
            .await?
            .ok_or_else(|| AppError::Internal {
                message: format!("insert into {} returned no row", table),
            })?;

        record_from_row(&row)
    }

    /// Update a live record; absent patch fields keep their stored value
    pub async fn update(&self, id: Uuid, patch: ResourcePatch) -> Result<ResourceRecord> {
        let table = self.kind.table();
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!(
                    "UPDATE {table} SET \
                     title = COALESCE($1, title), \
                     status = COALESCE($2, status), \
                     severity = COALESCE($3, severity), \
                     owner = COALESCE($4, owner), \
                     details = COALESCE($5, details), \
                     updated_at = NOW() \
                     WHERE id = $6 AND is_deleted = FALSE \
                     RETURNING {RECORD_COLUMNS}"
                ),
                vec![
                    patch.title.into(),
                    patch.status.into(),
                    patch.severity.into(),
                    patch.owner.into(),
                    patch.details.into(),
                    id.into(),
                ],
            ))
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(self.not_found(id)),
        }
    }

    /// Move a record to the recycle bin
    pub async fn soft_delete(&self, id: Uuid, actor: Uuid) -> Result<()> {
        let table = self.kind.table();
        let result = self
            .scope
            .conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!(
                    "UPDATE {table} SET \
                     is_deleted = TRUE, deleted_at = NOW(), deleted_by = $1, updated_at = NOW() \
                     WHERE id = $2 AND is_deleted = FALSE"
                ),
                vec![actor.into(), id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.not_found(id));
        }
        Ok(())
    }

    /// Bring a record back from the recycle bin
    pub async fn restore(&self, id: Uuid) -> Result<ResourceRecord> {
        let table = self.kind.table();
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!(
                    "UPDATE {table} SET \
                     is_deleted = FALSE, deleted_at = NULL, deleted_by = NULL, updated_at = NOW() \
                     WHERE id = $1 AND is_deleted = TRUE \
                     RETURNING {RECORD_COLUMNS}"
                ),
                vec![id.into()],
            ))
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(self.not_found(id)),
        }
    }

    /// Remove a record for good
    pub async fn purge(&self, id: Uuid) -> Result<()> {
        let table = self.kind.table();
        let result = self
            .scope
            .conn()
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!("DELETE FROM {table} WHERE id = $1"),
                vec![id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.not_found(id));
        }
        Ok(())
    }

    /// Apply a declared workflow action to a live record
    pub async fn apply_action(
        &self,
        id: Uuid,
        action: ResourceAction,
    ) -> Result<ResourceRecord> {
        let table = self.kind.table();
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!(
                    "UPDATE {table} SET status = $1, updated_at = NOW() \
                     WHERE id = $2 AND is_deleted = FALSE \
                     RETURNING {RECORD_COLUMNS}"
                ),
                vec![action.resulting_status().into(), id.into()],
            ))
            .await?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(self.not_found(id)),
        }
    }

    /// Live-record counts grouped by status and severity
    pub async fn stats(&self) -> Result<ResourceStats> {
        let table = self.kind.table();
        let rows = self
            .scope
            .conn()
            .query_all(Statement::from_string(
                DbBackend::Postgres,
                format!(
                    "SELECT status, severity, COUNT(*) AS count FROM {table} \
                     WHERE is_deleted = FALSE GROUP BY status, severity"
                ),
            ))
            .await?;

        let mut stats = ResourceStats {
            total: 0,
            by_status: HashMap::new(),
            by_severity: HashMap::new(),
        };

        for row in rows {
            let status: String = row.try_get("", "status")?;
            let severity: Option<String> = row.try_get("", "severity")?;
            let count: i64 = row.try_get("", "count")?;

            stats.total += count;
            *stats.by_status.entry(status).or_insert(0) += count;
            if let Some(severity) = severity {
                *stats.by_severity.entry(severity).or_insert(0) += count;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::provisioner::ENVELOPE_TABLES;
    use std::collections::HashSet;

    #[test]
    fn test_every_family_has_a_provisioned_table() {
        for kind in ResourceKind::ALL {
            assert!(
                ENVELOPE_TABLES.contains(&kind.table()),
                "{:?} maps to unprovisioned table {}",
                kind,
                kind.table()
            );
        }
    }

    #[test]
    fn test_slugs_and_tables_are_unique() {
        let slugs: HashSet<_> = ResourceKind::ALL.iter().map(|k| k.slug()).collect();
        let tables: HashSet<_> = ResourceKind::ALL.iter().map(|k| k.table()).collect();
        assert_eq!(slugs.len(), ResourceKind::ALL.len());
        assert_eq!(tables.len(), ResourceKind::ALL.len());
    }

    #[test]
    fn test_from_slug_is_area_scoped() {
        assert_eq!(
            ResourceKind::from_slug(Area::Regops, "regulations"),
            Some(ResourceKind::Regulations)
        );
        assert_eq!(
            ResourceKind::from_slug(Area::Privacyops, "dsr"),
            Some(ResourceKind::Dsr)
        );
        // Right slug, wrong area.
        assert_eq!(ResourceKind::from_slug(Area::Auditops, "regulations"), None);
        assert_eq!(ResourceKind::from_slug(Area::Regops, "unknown"), None);
    }

    #[test]
    fn test_area_family_counts() {
        let count = |area: Area| {
            ResourceKind::ALL
                .iter()
                .filter(|k| k.area() == area)
                .count()
        };
        assert_eq!(count(Area::Regops), 4);
        assert_eq!(count(Area::Privacyops), 6);
        assert_eq!(count(Area::Riskops), 5);
        assert_eq!(count(Area::Auditops), 3);
    }

    #[test]
    fn test_action_slugs_round_trip() {
        for action in ResourceAction::ALL {
            assert_eq!(ResourceAction::from_slug(action.slug()), Some(action));
        }
        assert_eq!(ResourceAction::from_slug("escalate"), None);
    }

    #[test]
    fn test_action_statuses() {
        assert_eq!(ResourceAction::Approve.resulting_status(), "approved");
        assert_eq!(ResourceAction::Run.resulting_status(), "in_progress");
        assert_eq!(ResourceAction::Generate.resulting_status(), "generated");
    }

    #[test]
    fn test_approval_actions_need_approve_verb() {
        assert_eq!(ResourceAction::Approve.required_verb(), Verb::Approve);
        assert_eq!(ResourceAction::Reject.required_verb(), Verb::Approve);
        assert_eq!(ResourceAction::Resolve.required_verb(), Verb::Edit);
        assert_eq!(ResourceAction::Generate.required_verb(), Verb::Edit);
    }

    #[test]
    fn test_declared_actions() {
        assert!(ResourceKind::Policies.supports(ResourceAction::Approve));
        assert!(ResourceKind::Reports.supports(ResourceAction::Generate));
        assert!(ResourceKind::InternalAudits.supports(ResourceAction::Run));
        assert!(!ResourceKind::Regulations.supports(ResourceAction::Approve));
        assert!(!ResourceKind::Reports.supports(ResourceAction::Close));
        assert!(ResourceKind::Kris.actions().is_empty());
    }
}
