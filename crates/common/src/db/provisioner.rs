//! Per-tenant schema provisioning
//!
//! Every tenant owns a dedicated PostgreSQL schema holding its resource
//! tables. Provisioning is idempotent (`IF NOT EXISTS` throughout) so it can
//! be re-run against an existing tenant to pick up new tables. All DDL is
//! schema-qualified; only the envelope tables share a common shape.

use crate::db::{schema_name, DbPool};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use tracing::info;
use uuid::Uuid;

/// Resource tables sharing the common envelope shape, one per family.
///
/// `governance` is provisioned for parity with the other families even
/// though no route family maps onto it yet.
pub const ENVELOPE_TABLES: [&str; 19] = [
    "regulations",
    "policies",
    "controls",
    "evidence",
    "governance",
    "data_inventory",
    "ropa_records",
    "dsr_requests",
    "dpia_assessments",
    "privacy_controls",
    "incidents",
    "risk_register",
    "vulnerabilities",
    "vendor_assessments",
    "business_continuity",
    "kris",
    "audit_plans",
    "control_tests",
    "reports",
];

fn envelope_table_ddl(schema: &str, table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}"."{table}" (
            id         UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            title      TEXT NOT NULL,
            status     TEXT NOT NULL DEFAULT 'draft',
            severity   TEXT,
            owner      TEXT,
            details    JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            deleted_at TIMESTAMPTZ,
            deleted_by UUID,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    )
}

fn envelope_index_ddl(schema: &str, table: &str) -> [String; 2] {
    [
        format!(
            r#"CREATE INDEX IF NOT EXISTS {table}_status_idx ON "{schema}"."{table}"(status)"#
        ),
        format!(
            r#"CREATE INDEX IF NOT EXISTS {table}_live_idx ON "{schema}"."{table}"(created_at DESC) WHERE is_deleted = FALSE"#
        ),
    ]
}

fn document_tables_ddl(schema: &str) -> Vec<String> {
    vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".documents (
                id         UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                title      TEXT NOT NULL,
                doc_type   TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_by UUID,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".analyses (
                id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                document_title TEXT,
                summary        TEXT NOT NULL,
                findings       JSONB NOT NULL DEFAULT '[]'::jsonb,
                created_by     UUID,
                created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{schema}".document_chunks (
                id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                document_id UUID NOT NULL,
                chunk_index INT NOT NULL,
                content     TEXT NOT NULL,
                embedding   vector(1536),
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (document_id, chunk_index)
            )"#
        ),
        format!(
            r#"CREATE INDEX IF NOT EXISTS document_chunks_embedding_idx
               ON "{schema}".document_chunks USING hnsw (embedding vector_cosine_ops)"#
        ),
    ]
}

/// All DDL statements that bring a tenant schema up to date, in order
pub fn provisioning_statements(tenant_id: Uuid) -> Vec<String> {
    let schema = schema_name(tenant_id);
    let mut statements = vec![format!(r#"CREATE SCHEMA IF NOT EXISTS "{schema}""#)];

    for table in ENVELOPE_TABLES {
        statements.push(envelope_table_ddl(&schema, table));
        statements.extend(envelope_index_ddl(&schema, table));
    }

    statements.extend(document_tables_ddl(&schema));
    statements
}

/// Provision a tenant schema on an existing connection or transaction.
///
/// Registration runs this inside the same transaction that inserts the
/// tenant row, so a failed registration leaves no half-built schema behind.
pub async fn provision_in<C: ConnectionTrait>(conn: &C, tenant_id: Uuid) -> Result<()> {
    for sql in provisioning_statements(tenant_id) {
        conn.execute(Statement::from_string(DbBackend::Postgres, sql))
            .await?;
    }

    info!(tenant_id = %tenant_id, "Provisioned tenant schema");
    Ok(())
}

/// Provision a tenant schema directly against the pool
pub async fn provision(pool: &DbPool, tenant_id: Uuid) -> Result<()> {
    provision_in(&pool.primary, tenant_id).await
}

/// Drop a tenant's schema and everything in it.
///
/// Used only by permanent tenant deletion; soft delete never touches DDL.
pub async fn teardown_in<C: ConnectionTrait>(conn: &C, tenant_id: Uuid) -> Result<()> {
    let schema = schema_name(tenant_id);
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        format!(r#"DROP SCHEMA IF EXISTS "{schema}" CASCADE"#),
    ))
    .await?;

    info!(tenant_id = %tenant_id, "Dropped tenant schema");
    Ok(())
}
