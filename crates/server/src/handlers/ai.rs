//! AI assist handlers
//!
//! Provider resolution prefers the tenant's stored settings (decrypted key,
//! own endpoint and models) and falls back to the platform provider. Calls
//! are never retried; a provider failure surfaces with the provider's
//! message. Document generation embeds the content chunks in the same
//! tenant scope as the document row.

use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tenon_common::ai::{build_provider, chunk_text, AiProvider, ChatMessage, ProviderSettings};
use tenon_common::auth::AuthContext;
use tenon_common::db::documents::DocumentSummary;
use tenon_common::db::{
    AnalysisRecord, ChunkHit, DocumentRecord, DocumentStore, EmbeddedChunk, Repository,
    TenantScope,
};
use tenon_common::errors::{AppError, Result};
use tenon_common::metrics::record_ai;
use tenon_common::rbac::Permission;
use uuid::Uuid;
use validator::Validate;

/// Characters per embedded chunk
const CHUNK_CHARS: usize = 1200;
/// Overlap between adjacent chunks
const CHUNK_OVERLAP: usize = 150;

const SEARCH_DEFAULT_LIMIT: u64 = 10;
const SEARCH_MAX_LIMIT: u64 = 50;

/// Resolve the provider serving a tenant's AI requests.
///
/// Tenant settings win when they are enabled and carry a key; otherwise the
/// platform-wide provider. No provider anywhere is a client error, the
/// tenant simply has not configured AI.
pub(crate) async fn resolve_provider(
    state: &AppState,
    tenant_id: Uuid,
) -> Result<Arc<dyn AiProvider>> {
    if let Some(settings) = state.repo.ai_settings(tenant_id).await? {
        if settings.enabled {
            if let Some(sealed) = &settings.api_key_encrypted {
                let secrets =
                    state
                        .secrets
                        .as_ref()
                        .ok_or_else(|| AppError::Configuration {
                            message: "crypto.encryption_key must be set to use tenant API keys"
                                .to_string(),
                        })?;
                let api_key = secrets.open(sealed)?;
                let timeout = Duration::from_secs(state.config.ai.timeout_secs);
                let provider_settings = ProviderSettings::from_tenant(&settings, api_key, timeout);
                return build_provider(&settings.provider, provider_settings);
            }
        }
    }

    state.ai.clone().ok_or(AppError::AiNotConfigured)
}

async fn timed_chat(provider: &Arc<dyn AiProvider>, messages: &[ChatMessage]) -> Result<String> {
    let started = Instant::now();
    let result = provider.chat(messages).await;
    record_ai(started.elapsed().as_secs_f64(), "chat", result.is_ok());
    result
}

async fn timed_embed(provider: &Arc<dyn AiProvider>, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
    let started = Instant::now();
    let result = provider.embed(inputs).await;
    record_ai(started.elapsed().as_secs_f64(), "embed", result.is_ok());
    result
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 8000, message = "Message is required"))]
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// POST /api/ai/chat
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    auth.require(Permission::AiChat)?;
    let tenant_id = auth.require_tenant()?;

    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let provider = resolve_provider(&state, tenant_id).await?;

    let mut messages = vec![ChatMessage::system(
        "You are a governance, risk, and compliance assistant. Answer precisely \
         and cite the relevant frameworks where applicable.",
    )];
    for entry in &payload.history {
        messages.push(match entry.role.as_str() {
            "assistant" => ChatMessage::assistant(entry.content.clone()),
            _ => ChatMessage::user(entry.content.clone()),
        });
    }
    messages.push(ChatMessage::user(payload.message));

    let reply = timed_chat(&provider, &messages).await?;

    Ok(Json(ChatResponse { reply }))
}

#[derive(Debug, Deserialize)]
pub struct DocumentListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// GET /api/ai/documents
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Vec<DocumentSummary>>> {
    auth.require(Permission::AiChat)?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let documents = DocumentStore::new(&scope)
        .list(query.limit.unwrap_or(50).min(200), query.offset.unwrap_or(0))
        .await?;
    scope.commit().await?;

    Ok(Json(documents))
}

/// GET /api/ai/documents/{id}
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentRecord>> {
    auth.require(Permission::AiChat)?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let document = DocumentStore::new(&scope).get(id).await?;
    scope.commit().await?;

    Ok(Json(document))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDocumentRequest {
    #[validate(length(min = 1, max = 500, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Document type is required"))]
    pub doc_type: String,
    #[validate(length(min = 1, max = 8000, message = "Instructions are required"))]
    pub instructions: String,
}

/// POST /api/ai/documents
///
/// Generates the content, then stores the document, its chunk embeddings,
/// and the audit entry in one tenant scope.
pub async fn generate_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<GenerateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentRecord>)> {
    auth.require(Permission::DocumentGenerate)?;
    let tenant_id = auth.require_tenant()?;

    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let provider = resolve_provider(&state, tenant_id).await?;

    let messages = [
        ChatMessage::system(
            "You are a compliance document author. Produce a complete, well \
             structured document in Markdown.",
        ),
        ChatMessage::user(format!(
            "Write a {} titled {:?}.\n\n{}",
            payload.doc_type, payload.title, payload.instructions
        )),
    ];
    let content = timed_chat(&provider, &messages).await?;

    let chunks = chunk_text(&content, CHUNK_CHARS, CHUNK_OVERLAP);
    let embeddings = if chunks.is_empty() {
        Vec::new()
    } else {
        timed_embed(&provider, &chunks).await?
    };
    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(content, embedding)| EmbeddedChunk { content, embedding })
        .collect();

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let store = DocumentStore::new(&scope);
    let document = store
        .create(&payload.title, &payload.doc_type, &content, auth.user_id)
        .await?;
    store.store_chunks(document.id, &embedded).await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "document.generated",
        format!("document:{}", document.id),
        json!({ "title": document.title.as_str(), "docType": document.doc_type.as_str() }),
    )
    .await?;
    scope.commit().await?;

    tracing::info!(
        document_id = %document.id,
        doc_type = %document.doc_type,
        chunks = embedded.len(),
        "Document generated"
    );

    Ok((StatusCode::CREATED, Json(document)))
}

#[derive(Debug, Deserialize)]
struct AnalysisReply {
    summary: String,
    #[serde(default)]
    findings: Vec<serde_json::Value>,
}

/// Providers often wrap JSON in a Markdown code fence
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Parse the model's analysis; a reply that is not the requested JSON
/// becomes the summary with no findings
fn parse_analysis(reply: &str) -> (String, serde_json::Value) {
    match serde_json::from_str::<AnalysisReply>(strip_code_fence(reply)) {
        Ok(parsed) => (parsed.summary, serde_json::Value::Array(parsed.findings)),
        Err(_) => (reply.trim().to_string(), json!([])),
    }
}

/// POST /api/ai/documents/{id}/analyze
pub async fn analyze_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AnalysisRecord>)> {
    auth.require(Permission::DocumentAnalyze)?;
    let tenant_id = auth.require_tenant()?;

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let document = DocumentStore::new(&scope).get(id).await?;
    scope.commit().await?;

    let provider = resolve_provider(&state, tenant_id).await?;
    let messages = [
        ChatMessage::system(
            "You are a compliance reviewer. Respond with JSON only: \
             {\"summary\": string, \"findings\": [{\"title\": string, \
             \"severity\": string, \"detail\": string}]}",
        ),
        ChatMessage::user(format!(
            "Analyze this document for compliance gaps and risks.\n\nTitle: {}\n\n{}",
            document.title, document.content
        )),
    ];
    let reply = timed_chat(&provider, &messages).await?;
    let (summary, findings) = parse_analysis(&reply);

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let analysis = DocumentStore::new(&scope)
        .create_analysis(&document.title, &summary, findings, auth.user_id)
        .await?;
    Repository::record_audit_in(
        scope.conn(),
        Some(tenant_id),
        Some(auth.user_id),
        "document.analyzed",
        format!("document:{}", id),
        json!({ "title": document.title.as_str() }),
    )
    .await?;
    scope.commit().await?;

    Ok((StatusCode::CREATED, Json(analysis)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 2000, message = "Query is required"))]
    pub query: String,
    pub limit: Option<u64>,
}

/// POST /api/ai/search
pub async fn search(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<ChunkHit>>> {
    auth.require(Permission::AiSearch)?;
    let tenant_id = auth.require_tenant()?;

    payload.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let provider = resolve_provider(&state, tenant_id).await?;
    let embedding = timed_embed(&provider, std::slice::from_ref(&payload.query))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::AiProvider {
            message: "Embedding response was empty".to_string(),
        })?;

    let limit = payload
        .limit
        .unwrap_or(SEARCH_DEFAULT_LIMIT)
        .min(SEARCH_MAX_LIMIT);

    let scope = TenantScope::begin(&state.db, tenant_id).await?;
    let hits = DocumentStore::new(&scope).search(&embedding, limit).await?;
    scope.commit().await?;

    Ok(Json(hits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_accepts_clean_json() {
        let reply = r#"{"summary": "Two gaps found", "findings": [{"title": "No DPO"}]}"#;
        let (summary, findings) = parse_analysis(reply);
        assert_eq!(summary, "Two gaps found");
        assert_eq!(findings.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_analysis_strips_code_fence() {
        let reply = "```json\n{\"summary\": \"ok\", \"findings\": []}\n```";
        let (summary, findings) = parse_analysis(reply);
        assert_eq!(summary, "ok");
        assert_eq!(findings, json!([]));
    }

    #[test]
    fn test_parse_analysis_falls_back_to_raw_text() {
        let reply = "The document looks broadly compliant.";
        let (summary, findings) = parse_analysis(reply);
        assert_eq!(summary, reply);
        assert_eq!(findings, json!([]));
    }

    #[test]
    fn test_chat_request_rejects_empty_message() {
        let payload = ChatRequest {
            message: String::new(),
            history: Vec::new(),
        };
        assert!(payload.validate().is_err());
    }
}
