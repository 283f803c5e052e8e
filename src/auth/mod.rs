//! Authentication and authorization
//!
//! Handles:
//! - Session tokens (JWT)
//! - Password hashing and token encryption
//! - GitHub OAuth flow and account linking
//! - Permission checks and authentication middleware

pub mod credentials;
mod identity;
mod middleware;
pub mod oauth;
pub mod permissions;
mod routes;
mod service;
pub mod token;

pub use credentials::{PasswordHasher, TokenCipher};
pub use identity::resolve_github_identity;
pub use middleware::{
    AuthContext, Authorized, CurrentUser, ManageUsers, PermissionSet, SESSION_COOKIE,
    attach_auth_context, clear_session_cookie, session_cookie,
};
pub use oauth::{GitHubOAuth, GitHubProfile};
pub use permissions::{Permission, permissions_for, role_has_permission};
pub use routes::auth_router;
pub use service::AuthService;
pub use token::{Claims, TokenService};
