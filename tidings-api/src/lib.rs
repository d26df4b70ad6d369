//! Tidings API - Notification Feed Service
//!
//! The subscription-facing side of the feed: retention gating, scope
//! resolution, permission checks, the page-assembling notification service
//! and its HTTP surface.

pub mod age_gate;
pub mod error;
pub mod middleware;
pub mod permissions;
pub mod routes;
pub mod scope;
pub mod service;
pub mod state;
pub mod telemetry;

pub use age_gate::AgeGate;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{caller_context_middleware, CallerExtractor};
pub use permissions::{FeedOperation, PermissionTable};
pub use routes::create_router;
pub use scope::{FeedScope, ScopeRegistry};
pub use service::NotificationService;
pub use state::AppState;
