//! HTTP middleware
//!
//! - `authenticate`: token validation and tenant binding
//! - `require_super_admin`: platform route gate
//! - `rate_limit`: global request throttle
//! - `track_metrics`: per-request latency and status recording

pub mod auth;
pub mod metrics;
pub mod rate_limit;

pub use auth::{authenticate, require_super_admin};
pub use metrics::track_metrics;
