//! API layer
//!
//! HTTP handlers for:
//! - User directory (admin only)
//! - Metrics (Prometheus)
//!
//! Auth endpoints live in the `auth` module.

mod envelope;
pub mod metrics;
mod users;

pub use envelope::{ApiResponse, ErrorDetail, MessageResponse, PaginationMeta, ResponseMeta};
pub use metrics::{metrics_router, track_requests};
pub use users::users_router;
