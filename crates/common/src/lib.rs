//! Tenon Common Library
//!
//! Shared code for the Tenon GRC platform including:
//! - Tenant registry, schema provisioning, and scoped database access
//! - Role/permission catalog and authorization primitives
//! - Session tokens, password hashing, and secret-at-rest handling
//! - AI provider client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and caching

pub mod ai;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod rbac;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository, TenantScope};
pub use errors::{AppError, Result};
pub use rbac::{Area, Permission, Role};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default chat completion model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
