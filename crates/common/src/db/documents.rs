//! AI document artifacts inside a tenant schema
//!
//! Generated documents, their chunk embeddings, and stored analyses live
//! in the tenant's schema next to the GRC tables. All SQL runs on a
//! `TenantScope`, so unqualified table names resolve through the
//! transaction-local search_path. Embeddings cross into SQL as pgvector
//! text literals bound to a `::vector` cast.

use crate::db::TenantScope;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DbBackend, QueryResult, Statement};
use serde::Serialize;
use serde_json::Value as Json;
use uuid::Uuid;

/// A generated document with its full content
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: Uuid,
    pub title: String,
    pub doc_type: String,
    pub content: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row; content is omitted because documents can run long
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: Uuid,
    pub title: String,
    pub doc_type: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A stored analysis result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub document_title: Option<String>,
    pub summary: String,
    pub findings: Json,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Chunk content paired with its embedding, ready for storage
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub content: String,
    pub embedding: Vec<f32>,
}

/// One similarity search hit
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHit {
    pub document_id: Uuid,
    pub document_title: String,
    pub chunk_index: i32,
    pub content: String,
    pub score: f32,
}

/// pgvector text form: `[0.1,0.2,…]`
fn vector_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn document_from_row(row: &QueryResult) -> Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.try_get("", "id")?,
        title: row.try_get("", "title")?,
        doc_type: row.try_get("", "doc_type")?,
        content: row.try_get("", "content")?,
        created_by: row.try_get("", "created_by")?,
        created_at: row.try_get("", "created_at")?,
        updated_at: row.try_get("", "updated_at")?,
    })
}

/// Store for documents, chunk embeddings, and analyses
pub struct DocumentStore<'a> {
    scope: &'a TenantScope,
}

impl<'a> DocumentStore<'a> {
    pub fn new(scope: &'a TenantScope) -> Self {
        Self { scope }
    }

    /// Insert a generated document and return the stored row
    pub async fn create(
        &self,
        title: &str,
        doc_type: &str,
        content: &str,
        created_by: Uuid,
    ) -> Result<DocumentRecord> {
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO documents (title, doc_type, content, created_by) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, title, doc_type, content, created_by, created_at, updated_at",
                vec![
                    title.into(),
                    doc_type.into(),
                    content.into(),
                    created_by.into(),
                ],
            ))
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Document insert returned no row".to_string(),
            })?;

        document_from_row(&row)
    }

    /// Fetch a document by id
    pub async fn get(&self, id: Uuid) -> Result<DocumentRecord> {
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT id, title, doc_type, content, created_by, created_at, updated_at \
                 FROM documents WHERE id = $1",
                vec![id.into()],
            ))
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: "document".to_string(),
                id: id.to_string(),
            })?;

        document_from_row(&row)
    }

    /// List documents, newest first
    pub async fn list(&self, limit: u64, offset: u64) -> Result<Vec<DocumentSummary>> {
        let rows = self
            .scope
            .conn()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT id, title, doc_type, created_by, created_at \
                 FROM documents ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                vec![(limit as i64).into(), (offset as i64).into()],
            ))
            .await?;

        rows.iter()
            .map(|row| {
                Ok(DocumentSummary {
                    id: row.try_get("", "id")?,
                    title: row.try_get("", "title")?,
                    doc_type: row.try_get("", "doc_type")?,
                    created_by: row.try_get("", "created_by")?,
                    created_at: row.try_get("", "created_at")?,
                })
            })
            .collect()
    }

    /// Store a document's chunk embeddings; indexes follow slice order
    pub async fn store_chunks(&self, document_id: Uuid, chunks: &[EmbeddedChunk]) -> Result<()> {
        for (index, chunk) in chunks.iter().enumerate() {
            self.scope
                .conn()
                .execute(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    "INSERT INTO document_chunks (document_id, chunk_index, content, embedding) \
                     VALUES ($1, $2, $3, $4::vector)",
                    vec![
                        document_id.into(),
                        (index as i32).into(),
                        chunk.content.as_str().into(),
                        vector_literal(&chunk.embedding).into(),
                    ],
                ))
                .await?;
        }
        Ok(())
    }

    /// Insert an analysis result
    pub async fn create_analysis(
        &self,
        document_title: &str,
        summary: &str,
        findings: Json,
        created_by: Uuid,
    ) -> Result<AnalysisRecord> {
        let row = self
            .scope
            .conn()
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO analyses (document_title, summary, findings, created_by) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, document_title, summary, findings, created_by, created_at",
                vec![
                    document_title.into(),
                    summary.into(),
                    findings.into(),
                    created_by.into(),
                ],
            ))
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "Analysis insert returned no row".to_string(),
            })?;

        Ok(AnalysisRecord {
            id: row.try_get("", "id")?,
            document_title: row.try_get("", "document_title")?,
            summary: row.try_get("", "summary")?,
            findings: row.try_get("", "findings")?,
            created_by: row.try_get("", "created_by")?,
            created_at: row.try_get("", "created_at")?,
        })
    }

    /// Cosine similarity search over the tenant's chunks.
    /// Score is `1 - cosine_distance`, so higher is closer.
    pub async fn search(&self, embedding: &[f32], limit: u64) -> Result<Vec<ChunkHit>> {
        let rows = self
            .scope
            .conn()
            .query_all(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT c.document_id, d.title AS document_title, c.chunk_index, c.content, \
                        1 - (c.embedding <=> $1::vector) AS score \
                 FROM document_chunks c \
                 INNER JOIN documents d ON c.document_id = d.id \
                 WHERE c.embedding IS NOT NULL \
                 ORDER BY c.embedding <=> $1::vector \
                 LIMIT $2",
                vec![vector_literal(embedding).into(), (limit as i64).into()],
            ))
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ChunkHit {
                    document_id: row.try_get("", "document_id")?,
                    document_title: row.try_get("", "document_title")?,
                    chunk_index: row.try_get("", "chunk_index")?,
                    content: row.try_get("", "content")?,
                    score: row.try_get::<f64>("", "score")? as f32,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_literal_format() {
        let embedding = vec![0.1, 0.2, 0.3];
        assert_eq!(vector_literal(&embedding), "[0.1,0.2,0.3]");
    }

    #[test]
    fn test_vector_literal_empty() {
        assert_eq!(vector_literal(&[]), "[]");
    }
}
