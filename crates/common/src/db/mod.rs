//! Database layer for Tenon
//!
//! Provides:
//! - SeaORM entity models for the shared control plane
//! - Repository pattern for control-plane access
//! - Connection pool management and migrations
//! - `TenantScope`, a transaction pinned to one tenant's schema
//! - Per-tenant schema provisioning and the resource envelope store

pub mod documents;
pub mod models;
pub mod provisioner;
mod repository;
pub mod resources;

pub use documents::{AnalysisRecord, ChunkHit, DocumentRecord, DocumentStore, EmbeddedChunk};
pub use repository::{
    AiSettingsValues, NewUser, PlatformStats, RegisteredTenant, Repository, SubscriptionPatch,
    TenantRegistration,
};
pub use resources::{ResourceAction, ResourceKind, ResourceRecord, ResourceStore};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    Statement, TransactionTrait,
};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Database connection pool wrapper
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct DbPool {
    /// Primary connection pool
    pub primary: DatabaseConnection,
}

// sea-orm withholds `Clone` from `DatabaseConnection` while its `mock`
// feature is on, even though every compiled variant's payload is cloneable,
// so mock-enabled builds clone the pool handle variant-by-variant.
#[cfg(feature = "mock")]
impl Clone for DbPool {
    fn clone(&self) -> Self {
        let primary = match &self.primary {
            DatabaseConnection::SqlxPostgresPoolConnection(conn) => {
                DatabaseConnection::SqlxPostgresPoolConnection(conn.clone())
            }
            DatabaseConnection::MockDatabaseConnection(conn) => {
                DatabaseConnection::MockDatabaseConnection(conn.clone())
            }
            DatabaseConnection::Disconnected => DatabaseConnection::Disconnected,
        };
        Self { primary }
    }
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(config.url());
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    /// Wrap an already-open connection (used by tests)
    pub fn from_connection(conn: DatabaseConnection) -> Self {
        Self { primary: conn }
    }

    /// Get the underlying connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Database ping failed: {}", e),
            })?;

        Ok(())
    }
}

/// Embedded control-plane migrations, applied at startup
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Run pending control-plane migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations...");

    MIGRATOR
        .run(pool.primary.get_postgres_connection_pool())
        .await
        .map_err(|e| AppError::DatabaseConnection {
            message: format!("Migration failed: {}", e),
        })?;

    info!("Migrations up to date");
    Ok(())
}

/// Schema name for a tenant. Derived from the UUID alone, never from
/// user-supplied text, so it is always a valid unquoted-safe identifier.
pub fn schema_name(tenant_id: Uuid) -> String {
    format!("tenant_{}", tenant_id.simple())
}

/// SQL that pins the current transaction to a tenant schema.
///
/// `SET LOCAL` scopes the change to the enclosing transaction, so the
/// search_path can never leak back into the pool with the connection.
pub fn set_search_path_sql(schema: &str) -> String {
    format!("SET LOCAL search_path TO \"{}\", public", schema)
}

/// A transaction pinned to one tenant's schema.
///
/// All tenant-resource SQL runs through one of these: unqualified table
/// names resolve into the tenant's schema via the transaction-local
/// search_path. Dropping the scope without committing rolls back.
pub struct TenantScope {
    txn: DatabaseTransaction,
    tenant_id: Uuid,
}

impl TenantScope {
    /// Open a transaction and pin its search_path to the tenant's schema
    pub async fn begin(pool: &DbPool, tenant_id: Uuid) -> Result<Self> {
        let txn = pool.primary.begin().await?;

        let schema = schema_name(tenant_id);
        txn.execute(Statement::from_string(
            DbBackend::Postgres,
            set_search_path_sql(&schema),
        ))
        .await?;

        Ok(Self { txn, tenant_id })
    }

    /// The tenant this scope is pinned to
    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Borrow the scoped transaction for queries
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Commit the scoped transaction
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    /// Roll the scoped transaction back explicitly
    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_name_format() {
        let id = Uuid::parse_str("a1b2c3d4-e5f6-4a1b-8c2d-3e4f5a6b7c8d").unwrap();
        assert_eq!(schema_name(id), "tenant_a1b2c3d4e5f64a1b8c2d3e4f5a6b7c8d");
    }

    #[test]
    fn test_schema_name_is_identifier_safe() {
        let name = schema_name(Uuid::new_v4());
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        assert!(name.starts_with("tenant_"));
        assert_eq!(name.len(), "tenant_".len() + 32);
    }

    #[test]
    fn test_search_path_is_transaction_local() {
        let sql = set_search_path_sql("tenant_abc123");
        assert!(sql.starts_with("SET LOCAL "));
        assert!(sql.contains("\"tenant_abc123\""));
        assert!(sql.ends_with(", public"));
    }
}
