//! Service layer
//!
//! Contains business logic separated from HTTP handlers.

pub mod user;

pub use user::UserService;
