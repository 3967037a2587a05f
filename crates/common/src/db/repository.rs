//! Repository pattern for control-plane operations
//!
//! Provides a clean interface for all shared-schema data access (tenants,
//! users, subscriptions, AI settings, audit log) with proper error handling
//! and transaction support. Tenant resource tables are served by
//! `resources::ResourceStore`, not here.
//!
//! Mutations that change control-plane state write their own audit entry in
//! the same transaction, so the trail cannot diverge from the data.

use crate::db::models::*;
use crate::db::{provisioner, DbPool};
use crate::errors::{AppError, Result};
use crate::rbac::Role;
use chrono::{Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// Everything needed to register a tenant with its first administrator.
/// The password arrives pre-hashed; the repository never sees plaintext.
#[derive(Debug, Clone)]
pub struct TenantRegistration {
    pub company_name: String,
    pub domain: String,
    pub admin_email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub plan: String,
    pub billing_cycle: BillingCycle,
}

/// Rows created by a successful registration
#[derive(Debug, Clone)]
pub struct RegisteredTenant {
    pub tenant: Tenant,
    pub admin: User,
    pub subscription: Subscription,
}

/// Fields for creating a user outside registration
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: Option<Uuid>,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_super_admin: bool,
}

/// Platform billing patch; absent fields keep their stored value
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub plan: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub billing_cycle: Option<BillingCycle>,
    pub price_cents: Option<i64>,
}

/// Full desired state of a tenant's AI settings; the handler merges masked
/// keys before calling save
#[derive(Debug, Clone)]
pub struct AiSettingsValues {
    pub provider: String,
    pub api_key_encrypted: Option<String>,
    pub api_base: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub enabled: bool,
}

/// Tenant and user counts for platform analytics; deserializable so it can
/// round-trip through the response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_tenants: i64,
    pub tenants_by_status: HashMap<String, i64>,
    pub total_users: i64,
    pub users_by_status: HashMap<String, i64>,
}

/// Repository for control-plane data access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        &self.pool.primary
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Audit Trail
    // ========================================================================

    /// Append an audit entry on a caller-supplied connection, so mutations
    /// and their trail entries share one transaction
    pub async fn record_audit_in<C: ConnectionTrait>(
        conn: &C,
        tenant_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        action: &str,
        target: String,
        detail: serde_json::Value,
    ) -> Result<()> {
        AuditEntryActiveModel {
            tenant_id: Set(tenant_id),
            actor_id: Set(actor_id),
            action: Set(action.to_string()),
            target: Set(target),
            detail: Set(detail),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        Ok(())
    }

    /// Append an audit entry outside any transaction
    pub async fn record_audit(
        &self,
        tenant_id: Option<Uuid>,
        actor_id: Option<Uuid>,
        action: &str,
        target: impl Into<String>,
        detail: serde_json::Value,
    ) -> Result<()> {
        Self::record_audit_in(self.conn(), tenant_id, actor_id, action, target.into(), detail)
            .await
    }

    /// Newest-first audit entries, optionally filtered by tenant and
    /// action prefix
    pub async fn list_audit(
        &self,
        tenant_id: Option<Uuid>,
        action_prefix: Option<&str>,
        limit: u64,
    ) -> Result<Vec<AuditEntry>> {
        let mut query = AuditEntryEntity::find()
            .order_by_desc(AuditEntryColumn::CreatedAt)
            .limit(limit);

        if let Some(tenant_id) = tenant_id {
            query = query.filter(AuditEntryColumn::TenantId.eq(tenant_id));
        }
        if let Some(prefix) = action_prefix {
            query = query.filter(AuditEntryColumn::Action.starts_with(prefix));
        }

        query.all(self.conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Tenant Operations
    // ========================================================================

    /// Find a tenant by ID regardless of status
    pub async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        TenantEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find a live tenant by domain
    pub async fn find_tenant_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        TenantEntity::find()
            .filter(TenantColumn::Domain.eq(domain.to_lowercase()))
            .filter(TenantColumn::DeletedAt.is_null())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List tenants, newest first
    pub async fn list_tenants(&self, include_deleted: bool) -> Result<Vec<Tenant>> {
        let mut query = TenantEntity::find().order_by_desc(TenantColumn::CreatedAt);
        if !include_deleted {
            query = query.filter(TenantColumn::DeletedAt.is_null());
        }
        query.all(self.conn()).await.map_err(Into::into)
    }

    /// Tenants sitting in the recycle bin
    pub async fn list_deleted_tenants(&self) -> Result<Vec<Tenant>> {
        TenantEntity::find()
            .filter(TenantColumn::DeletedAt.is_not_null())
            .order_by_desc(TenantColumn::DeletedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Register a tenant: duplicate checks, tenant + subscription rows,
    /// schema provisioning and the first admin, all in one transaction.
    /// Any failure, including DDL, rolls the whole registration back.
    pub async fn register_tenant(&self, reg: TenantRegistration) -> Result<RegisteredTenant> {
        let email = reg.admin_email.to_lowercase();
        let domain = reg.domain.to_lowercase();

        let txn = self.conn().begin().await?;

        if UserEntity::find()
            .filter(UserColumn::Email.eq(email.clone()))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate {
                message: "Email already registered".to_string(),
            });
        }

        if TenantEntity::find()
            .filter(TenantColumn::Domain.eq(domain.clone()))
            .filter(TenantColumn::DeletedAt.is_null())
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate {
                message: "Domain already registered".to_string(),
            });
        }

        if TenantEntity::find()
            .filter(TenantColumn::Name.eq(reg.company_name.clone()))
            .filter(TenantColumn::DeletedAt.is_null())
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate {
                message: "Organization name already registered".to_string(),
            });
        }

        let now = Utc::now();
        let tenant_id = Uuid::new_v4();

        let tenant = TenantActiveModel {
            id: Set(tenant_id),
            name: Set(reg.company_name),
            domain: Set(domain),
            status: Set(String::from(TenantStatus::Pending)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let subscription = SubscriptionActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            plan: Set(reg.plan),
            status: Set(String::from(SubscriptionStatus::Pending)),
            billing_cycle: Set(String::from(reg.billing_cycle)),
            price_cents: Set(0),
            currency: Set("USD".to_string()),
            start_date: Set(now.into()),
            end_date: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        provisioner::provision_in(&txn, tenant_id).await?;

        let admin = UserActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(Some(tenant_id)),
            email: Set(email),
            password_hash: Set(reg.password_hash),
            first_name: Set(reg.first_name),
            last_name: Set(reg.last_name),
            role: Set(Role::TenantAdmin.as_str().to_string()),
            status: Set(String::from(UserStatus::Active)),
            is_super_admin: Set(false),
            last_login_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        Self::record_audit_in(
            &txn,
            Some(tenant_id),
            Some(admin.id),
            "tenant.registered",
            format!("tenant:{tenant_id}"),
            json!({ "domain": tenant.domain, "plan": subscription.plan }),
        )
        .await?;

        txn.commit().await?;

        Ok(RegisteredTenant {
            tenant,
            admin,
            subscription,
        })
    }

    async fn transition_tenant_in(
        txn: &DatabaseTransaction,
        id: Uuid,
        allowed_from: &[TenantStatus],
        to: TenantStatus,
    ) -> Result<Tenant> {
        let tenant = TenantEntity::find_by_id(id)
            .one(txn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound { id: id.to_string() })?;

        let current = tenant.tenant_status();
        if !allowed_from.contains(&current) {
            return Err(AppError::Validation {
                message: format!(
                    "Tenant cannot move from {} to {}",
                    tenant.status,
                    String::from(to)
                ),
                field: None,
            });
        }

        let now = Utc::now();
        let mut active: TenantActiveModel = tenant.into();
        active.status = Set(String::from(to));
        active.updated_at = Set(now.into());
        active.deleted_at = if to == TenantStatus::Deleted {
            Set(Some(now.into()))
        } else {
            Set(None)
        };

        active.update(txn).await.map_err(Into::into)
    }

    /// Activate a pending tenant. The subscription goes active with its
    /// term starting now: 30 days monthly, 365 days annual.
    pub async fn activate_tenant(&self, id: Uuid, actor: Uuid) -> Result<Tenant> {
        let txn = self.conn().begin().await?;
        let tenant =
            Self::transition_tenant_in(&txn, id, &[TenantStatus::Pending], TenantStatus::Active)
                .await?;

        if let Some(subscription) = SubscriptionEntity::find()
            .filter(SubscriptionColumn::TenantId.eq(id))
            .order_by_desc(SubscriptionColumn::CreatedAt)
            .one(&txn)
            .await?
        {
            let now = Utc::now();
            let term = subscription.cycle().term_days();
            let mut active: SubscriptionActiveModel = subscription.into();
            active.status = Set(String::from(SubscriptionStatus::Active));
            active.start_date = Set(now.into());
            active.end_date = Set(Some((now + Duration::days(term)).into()));
            active.updated_at = Set(now.into());
            active.update(&txn).await?;
        }

        Self::record_audit_in(
            &txn,
            Some(id),
            Some(actor),
            "tenant.activated",
            format!("tenant:{id}"),
            json!({}),
        )
        .await?;

        txn.commit().await?;
        Ok(tenant)
    }

    /// Suspend an active tenant
    pub async fn suspend_tenant(&self, id: Uuid, actor: Uuid) -> Result<Tenant> {
        let txn = self.conn().begin().await?;
        let tenant =
            Self::transition_tenant_in(&txn, id, &[TenantStatus::Active], TenantStatus::Suspended)
                .await?;

        Self::record_audit_in(
            &txn,
            Some(id),
            Some(actor),
            "tenant.suspended",
            format!("tenant:{id}"),
            json!({}),
        )
        .await?;

        txn.commit().await?;
        Ok(tenant)
    }

    /// Reactivate a suspended tenant
    pub async fn reactivate_tenant(&self, id: Uuid, actor: Uuid) -> Result<Tenant> {
        let txn = self.conn().begin().await?;
        let tenant = Self::transition_tenant_in(
            &txn,
            id,
            &[TenantStatus::Suspended],
            TenantStatus::Active,
        )
        .await?;

        Self::record_audit_in(
            &txn,
            Some(id),
            Some(actor),
            "tenant.reactivated",
            format!("tenant:{id}"),
            json!({}),
        )
        .await?;

        txn.commit().await?;
        Ok(tenant)
    }

    /// Soft-delete a tenant. Data and schema stay in place; logins are
    /// refused by the lifecycle gate.
    pub async fn soft_delete_tenant(&self, id: Uuid, actor: Uuid) -> Result<Tenant> {
        let txn = self.conn().begin().await?;
        let tenant = Self::transition_tenant_in(
            &txn,
            id,
            &[
                TenantStatus::Pending,
                TenantStatus::Active,
                TenantStatus::Suspended,
            ],
            TenantStatus::Deleted,
        )
        .await?;

        Self::record_audit_in(
            &txn,
            Some(id),
            Some(actor),
            "tenant.deleted",
            format!("tenant:{id}"),
            json!({}),
        )
        .await?;

        txn.commit().await?;
        Ok(tenant)
    }

    /// Restore a soft-deleted tenant into the suspended state; a separate
    /// reactivation makes it live again
    pub async fn restore_tenant(&self, id: Uuid, actor: Uuid) -> Result<Tenant> {
        let txn = self.conn().begin().await?;
        let tenant = Self::transition_tenant_in(
            &txn,
            id,
            &[TenantStatus::Deleted],
            TenantStatus::Suspended,
        )
        .await?;

        Self::record_audit_in(
            &txn,
            Some(id),
            Some(actor),
            "tenant.restored",
            format!("tenant:{id}"),
            json!({}),
        )
        .await?;

        txn.commit().await?;
        Ok(tenant)
    }

    /// Permanently remove a soft-deleted tenant: drop its schema, then its
    /// users, subscriptions, AI settings and the tenant row. Audit entries
    /// survive as the only trace.
    pub async fn purge_tenant(&self, id: Uuid, actor: Uuid) -> Result<()> {
        let txn = self.conn().begin().await?;

        let tenant = TenantEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::TenantNotFound { id: id.to_string() })?;

        if tenant.tenant_status() != TenantStatus::Deleted {
            return Err(AppError::Validation {
                message: "Tenant must be deleted before permanent removal".to_string(),
                field: None,
            });
        }

        provisioner::teardown_in(&txn, id).await?;

        SubscriptionEntity::delete_many()
            .filter(SubscriptionColumn::TenantId.eq(id))
            .exec(&txn)
            .await?;
        AiSettingsEntity::delete_many()
            .filter(AiSettingsColumn::TenantId.eq(id))
            .exec(&txn)
            .await?;
        UserEntity::delete_many()
            .filter(UserColumn::TenantId.eq(id))
            .exec(&txn)
            .await?;
        TenantEntity::delete_by_id(id).exec(&txn).await?;

        Self::record_audit_in(
            &txn,
            Some(id),
            Some(actor),
            "tenant.purged",
            format!("tenant:{id}"),
            json!({ "name": tenant.name }),
        )
        .await?;

        txn.commit().await?;
        Ok(())
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find a live user by email (emails are stored lowercased)
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email.to_lowercase()))
            .filter(UserColumn::DeletedAt.is_null())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Find a user by ID
    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Create a user
    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let email = new_user.email.to_lowercase();

        if UserEntity::find()
            .filter(UserColumn::Email.eq(email.clone()))
            .one(self.conn())
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate {
                message: "Email already registered".to_string(),
            });
        }

        let now = Utc::now();
        UserActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(new_user.tenant_id),
            email: Set(email),
            password_hash: Set(new_user.password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            role: Set(new_user.role.as_str().to_string()),
            status: Set(String::from(UserStatus::Active)),
            is_super_admin: Set(new_user.is_super_admin),
            last_login_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            deleted_at: Set(None),
        }
        .insert(self.conn())
        .await
        .map_err(Into::into)
    }

    /// List users, newest first, optionally restricted to one tenant
    pub async fn list_users(&self, tenant_id: Option<Uuid>) -> Result<Vec<User>> {
        let mut query = UserEntity::find()
            .filter(UserColumn::DeletedAt.is_null())
            .order_by_desc(UserColumn::CreatedAt);

        if let Some(tenant_id) = tenant_id {
            query = query.filter(UserColumn::TenantId.eq(tenant_id));
        }

        query.all(self.conn()).await.map_err(Into::into)
    }

    /// Stamp a successful login
    pub async fn update_last_login(&self, id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1",
            vec![id.into()],
        );
        self.conn().execute(stmt).await?;
        Ok(())
    }

    /// Change a user's role
    pub async fn set_user_role(&self, id: Uuid, role: Role, actor: Uuid) -> Result<User> {
        let txn = self.conn().begin().await?;

        let user = UserEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::UserNotFound { id: id.to_string() })?;

        let tenant_id = user.tenant_id;
        let mut active: UserActiveModel = user.into();
        active.role = Set(role.as_str().to_string());
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        Self::record_audit_in(
            &txn,
            tenant_id,
            Some(actor),
            "user.role_changed",
            format!("user:{id}"),
            json!({ "role": role.as_str() }),
        )
        .await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Change a user's account status
    pub async fn set_user_status(
        &self,
        id: Uuid,
        status: UserStatus,
        actor: Uuid,
    ) -> Result<User> {
        let txn = self.conn().begin().await?;

        let user = UserEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::UserNotFound { id: id.to_string() })?;

        let tenant_id = user.tenant_id;
        let mut active: UserActiveModel = user.into();
        active.status = Set(String::from(status));
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        Self::record_audit_in(
            &txn,
            tenant_id,
            Some(actor),
            "user.status_changed",
            format!("user:{id}"),
            json!({ "status": String::from(status) }),
        )
        .await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Replace a user's password hash
    pub async fn set_user_password(&self, id: Uuid, password_hash: String) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2",
            vec![password_hash.into(), id.into()],
        );

        let result = self.conn().execute(stmt).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound { id: id.to_string() });
        }
        Ok(())
    }

    // ========================================================================
    // Subscription Operations
    // ========================================================================

    /// Latest subscription for a tenant
    pub async fn find_subscription(&self, tenant_id: Uuid) -> Result<Option<Subscription>> {
        SubscriptionEntity::find()
            .filter(SubscriptionColumn::TenantId.eq(tenant_id))
            .order_by_desc(SubscriptionColumn::CreatedAt)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// All subscriptions with their tenants, for the billing overview
    pub async fn list_subscriptions(&self) -> Result<Vec<(Subscription, Option<Tenant>)>> {
        SubscriptionEntity::find()
            .find_also_related(TenantEntity)
            .order_by_desc(SubscriptionColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Apply a billing patch. Setting status to active restarts the term
    /// from now using the effective billing cycle.
    pub async fn update_subscription(
        &self,
        tenant_id: Uuid,
        patch: SubscriptionPatch,
        actor: Uuid,
    ) -> Result<Subscription> {
        let txn = self.conn().begin().await?;

        let subscription = SubscriptionEntity::find()
            .filter(SubscriptionColumn::TenantId.eq(tenant_id))
            .order_by_desc(SubscriptionColumn::CreatedAt)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: "subscription".to_string(),
                id: tenant_id.to_string(),
            })?;

        let now = Utc::now();
        let cycle = patch.billing_cycle.unwrap_or_else(|| subscription.cycle());

        let mut active: SubscriptionActiveModel = subscription.into();
        if let Some(plan) = patch.plan.clone() {
            active.plan = Set(plan);
        }
        if let Some(cycle) = patch.billing_cycle {
            active.billing_cycle = Set(String::from(cycle));
        }
        if let Some(price_cents) = patch.price_cents {
            active.price_cents = Set(price_cents);
        }
        if let Some(status) = patch.status {
            active.status = Set(String::from(status));
            if status == SubscriptionStatus::Active {
                active.start_date = Set(now.into());
                active.end_date = Set(Some((now + Duration::days(cycle.term_days())).into()));
            }
        }
        active.updated_at = Set(now.into());
        let updated = active.update(&txn).await?;

        Self::record_audit_in(
            &txn,
            Some(tenant_id),
            Some(actor),
            "billing.updated",
            format!("tenant:{tenant_id}"),
            json!({
                "plan": patch.plan,
                "status": patch.status.map(String::from),
                "billingCycle": patch.billing_cycle.map(String::from),
            }),
        )
        .await?;

        txn.commit().await?;
        Ok(updated)
    }

    // ========================================================================
    // AI Settings
    // ========================================================================

    /// Stored AI settings for a tenant
    pub async fn ai_settings(&self, tenant_id: Uuid) -> Result<Option<AiSettings>> {
        AiSettingsEntity::find()
            .filter(AiSettingsColumn::TenantId.eq(tenant_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Upsert a tenant's AI settings with the given full state
    pub async fn save_ai_settings(
        &self,
        tenant_id: Uuid,
        values: AiSettingsValues,
    ) -> Result<AiSettings> {
        let now = Utc::now();
        let active = AiSettingsActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            provider: Set(values.provider),
            api_key_encrypted: Set(values.api_key_encrypted),
            api_base: Set(values.api_base),
            chat_model: Set(values.chat_model),
            embedding_model: Set(values.embedding_model),
            enabled: Set(values.enabled),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        AiSettingsEntity::insert(active)
            .on_conflict(
                OnConflict::column(AiSettingsColumn::TenantId)
                    .update_columns([
                        AiSettingsColumn::Provider,
                        AiSettingsColumn::ApiKeyEncrypted,
                        AiSettingsColumn::ApiBase,
                        AiSettingsColumn::ChatModel,
                        AiSettingsColumn::EmbeddingModel,
                        AiSettingsColumn::Enabled,
                        AiSettingsColumn::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Platform Analytics
    // ========================================================================

    /// Tenant and user counts grouped by status
    pub async fn platform_stats(&self) -> Result<PlatformStats> {
        let mut stats = PlatformStats {
            total_tenants: 0,
            tenants_by_status: HashMap::new(),
            total_users: 0,
            users_by_status: HashMap::new(),
        };

        let tenant_rows = self
            .conn()
            .query_all(Statement::from_string(
                DbBackend::Postgres,
                "SELECT status, COUNT(*) AS count FROM tenants GROUP BY status".to_string(),
            ))
            .await?;

        for row in tenant_rows {
            let status: String = row.try_get("", "status")?;
            let count: i64 = row.try_get("", "count")?;
            stats.total_tenants += count;
            stats.tenants_by_status.insert(status, count);
        }

        let user_rows = self
            .conn()
            .query_all(Statement::from_string(
                DbBackend::Postgres,
                "SELECT status, COUNT(*) AS count FROM users GROUP BY status".to_string(),
            ))
            .await?;

        for row in user_rows {
            let status: String = row.try_get("", "status")?;
            let count: i64 = row.try_get("", "count")?;
            stats.total_users += count;
            stats.users_by_status.insert(status, count);
        }

        Ok(stats)
    }
}
