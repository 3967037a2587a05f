//! Tenant AI settings handlers
//!
//! Stored API keys never leave the server: responses carry a mask, and a
//! PUT whose key equals the current mask keeps the stored ciphertext.
//! An empty string clears the key. Writing a fresh key without an
//! encryption passphrase configured is a hard configuration error.

use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tenon_common::auth::{is_unchanged_mask, mask_key, AuthContext, SecretBox};
use tenon_common::db::models::AiSettings;
use tenon_common::db::AiSettingsValues;
use tenon_common::errors::{AppError, Result};
use tenon_common::rbac::{Permission, Role};
use tenon_common::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};

const FALLBACK_MASK: &str = "********";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub provider: String,
    /// Masked; never the stored key itself
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub enabled: bool,
    pub configured: bool,
}

fn settings_view(stored: Option<&AiSettings>, secrets: Option<&SecretBox>) -> SettingsView {
    match stored {
        Some(settings) => SettingsView {
            provider: settings.provider.clone(),
            api_key: settings.api_key_encrypted.as_deref().map(|sealed| {
                secrets
                    .and_then(|box_| box_.open(sealed).ok())
                    .map(|plain| mask_key(&plain))
                    .unwrap_or_else(|| FALLBACK_MASK.to_string())
            }),
            api_base: settings.api_base.clone(),
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            enabled: settings.enabled,
            configured: settings.api_key_encrypted.is_some(),
        },
        None => SettingsView {
            provider: "openai".to_string(),
            api_key: None,
            api_base: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            enabled: false,
            configured: false,
        },
    }
}

fn require_settings_access(auth: &AuthContext) -> Result<uuid::Uuid> {
    auth.require(Permission::AdminSettings)?;
    auth.require_any_role(&[Role::TenantAdmin])?;
    auth.require_tenant()
}

/// GET /api/ai/settings
pub async fn get_settings(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<SettingsView>> {
    let tenant_id = require_settings_access(&auth)?;
    let stored = state.repo.ai_settings(tenant_id).await?;

    Ok(Json(settings_view(
        stored.as_ref(),
        state.secrets.as_deref(),
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub provider: Option<String>,
    /// `None` keeps the stored key, the current mask keeps it too, an empty
    /// string clears it, anything else replaces it
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub enabled: Option<bool>,
}

/// PUT /api/ai/settings
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsView>> {
    let tenant_id = require_settings_access(&auth)?;
    let stored = state.repo.ai_settings(tenant_id).await?;

    let api_key_encrypted = merge_api_key(
        payload.api_key.as_deref(),
        stored.as_ref().and_then(|s| s.api_key_encrypted.as_deref()),
        state.secrets.as_deref(),
    )?;

    let values = AiSettingsValues {
        provider: payload
            .provider
            .or_else(|| stored.as_ref().map(|s| s.provider.clone()))
            .unwrap_or_else(|| "openai".to_string()),
        api_key_encrypted,
        api_base: match payload.api_base {
            Some(base) if base.trim().is_empty() => None,
            Some(base) => Some(base),
            None => stored.as_ref().and_then(|s| s.api_base.clone()),
        },
        chat_model: payload
            .chat_model
            .or_else(|| stored.as_ref().map(|s| s.chat_model.clone()))
            .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        embedding_model: payload
            .embedding_model
            .or_else(|| stored.as_ref().map(|s| s.embedding_model.clone()))
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
        enabled: payload
            .enabled
            .or(stored.as_ref().map(|s| s.enabled))
            .unwrap_or(true),
    };

    let saved = state.repo.save_ai_settings(tenant_id, values).await?;
    state
        .repo
        .record_audit(
            Some(tenant_id),
            Some(auth.user_id),
            "settings.updated",
            format!("tenant:{tenant_id}"),
            json!({ "provider": saved.provider.as_str(), "enabled": saved.enabled }),
        )
        .await?;

    tracing::info!(%tenant_id, provider = %saved.provider, "AI settings updated");

    Ok(Json(settings_view(Some(&saved), state.secrets.as_deref())))
}

/// Decide what ciphertext to store for the API key
fn merge_api_key(
    submitted: Option<&str>,
    stored_sealed: Option<&str>,
    secrets: Option<&SecretBox>,
) -> Result<Option<String>> {
    let Some(submitted) = submitted else {
        return Ok(stored_sealed.map(String::from));
    };

    let submitted = submitted.trim();
    if submitted.is_empty() {
        return Ok(None);
    }

    // Unchanged mask round-trip: the client sent back what we showed it
    if let (Some(sealed), Some(secrets)) = (stored_sealed, secrets) {
        if let Ok(plain) = secrets.open(sealed) {
            if is_unchanged_mask(submitted, &plain) {
                return Ok(Some(sealed.to_string()));
            }
        }
    }

    let secrets = secrets.ok_or_else(|| AppError::Configuration {
        message: "crypto.encryption_key must be set to store API keys".to_string(),
    })?;
    secrets.seal(submitted).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_api_key_none_keeps_stored() {
        let secrets = SecretBox::from_passphrase("test-passphrase");
        let sealed = secrets.seal("sk-live-1234").unwrap();

        let merged = merge_api_key(None, Some(&sealed), Some(&secrets)).unwrap();
        assert_eq!(merged.as_deref(), Some(sealed.as_str()));
    }

    #[test]
    fn test_merge_api_key_empty_clears() {
        let secrets = SecretBox::from_passphrase("test-passphrase");
        let sealed = secrets.seal("sk-live-1234").unwrap();

        let merged = merge_api_key(Some("   "), Some(&sealed), Some(&secrets)).unwrap();
        assert_eq!(merged, None);
    }

    #[test]
    fn test_merge_api_key_mask_keeps_ciphertext() {
        let secrets = SecretBox::from_passphrase("test-passphrase");
        let sealed = secrets.seal("sk-live-12345678").unwrap();
        let mask = mask_key("sk-live-12345678");

        let merged = merge_api_key(Some(&mask), Some(&sealed), Some(&secrets)).unwrap();
        assert_eq!(merged.as_deref(), Some(sealed.as_str()));
    }

    #[test]
    fn test_merge_api_key_new_value_reseals() {
        let secrets = SecretBox::from_passphrase("test-passphrase");
        let sealed = secrets.seal("sk-live-old").unwrap();

        let merged = merge_api_key(Some("sk-live-new"), Some(&sealed), Some(&secrets))
            .unwrap()
            .unwrap();
        assert_ne!(merged, sealed);
        assert_eq!(secrets.open(&merged).unwrap(), "sk-live-new");
    }

    #[test]
    fn test_merge_api_key_without_crypto_fails() {
        let result = merge_api_key(Some("sk-live-new"), None, None);
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_default_view_when_unconfigured() {
        let view = settings_view(None, None);
        assert_eq!(view.provider, "openai");
        assert_eq!(view.api_key, None);
        assert!(!view.configured);
        assert!(!view.enabled);
    }
}
