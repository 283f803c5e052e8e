//! Authentication middleware
//!
//! Decodes the session cookie into a request-scoped [`AuthContext`] and
//! provides the extractors that enforce identity and permissions.
//!
//! A missing or invalid token is not an error at this layer; handlers
//! decide what they require through the extractor they take.

use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;

use super::permissions::{Permission, role_has_permission};
use super::token::Claims;
use crate::AppState;
use crate::error::AppError;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "access_token";

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| {
            headers
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(ToOwned::to_owned)
        })
}

fn decode_context(headers: &HeaderMap, state: &AppState) -> AuthContext {
    let claims = extract_token_from_headers(headers)
        .and_then(|token| state.auth.validate_session(&token).ok());
    AuthContext(claims)
}

// =============================================================================
// AuthContext
// =============================================================================

/// Identity attached to the current request, if any
#[derive(Debug, Clone, Default)]
pub struct AuthContext(pub Option<Claims>);

impl AuthContext {
    pub fn require_authenticated(&self) -> Result<&Claims, AppError> {
        self.0
            .as_ref()
            .ok_or_else(|| AppError::unauthorized("Not authenticated"))
    }

    pub fn require_permission(&self, permission: Permission) -> Result<&Claims, AppError> {
        let claims = self.require_authenticated()?;
        if !role_has_permission(claims.role, permission) {
            tracing::debug!(
                account_id = %claims.sub,
                role = %claims.role,
                %permission,
                "Permission denied"
            );
            return Err(AppError::forbidden(format!(
                "Permission '{permission}' required"
            )));
        }
        Ok(claims)
    }

    /// Every permission must be held; the first missing one is reported
    pub fn require_all(&self, permissions: &[Permission]) -> Result<&Claims, AppError> {
        let claims = self.require_authenticated()?;
        for permission in permissions {
            self.require_permission(*permission)?;
        }
        Ok(claims)
    }
}

/// Middleware that attaches an [`AuthContext`] to every request
///
/// Only layered onto routers whose handlers need identity; the extractors
/// below decode on demand when it is absent.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/users", ...)
///     .route_layer(middleware::from_fn_with_state(state, attach_auth_context));
/// ```
pub async fn attach_auth_context(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let context = decode_context(request.headers(), &state);
    request.extensions_mut().insert(context);
    next.run(request).await
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AuthContext>().cloned() {
            return Ok(context);
        }

        let app_state = AppState::from_ref(state);
        let context = decode_context(&parts.headers, &app_state);
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

// =============================================================================
// Enforcing extractors
// =============================================================================

/// Extractor for the authenticated caller
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(claims): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", claims.sub)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(context) = AuthContext::from_request_parts(parts, state).await;
        context.require_authenticated().cloned().map(CurrentUser)
    }
}

/// Permissions a route requires, as a type
pub trait PermissionSet: Send + Sync + 'static {
    const REQUIRED: &'static [Permission];
}

/// Requires [`Permission::ManageUsers`]
#[derive(Debug, Clone, Copy)]
pub struct ManageUsers;

impl PermissionSet for ManageUsers {
    const REQUIRED: &'static [Permission] = &[Permission::ManageUsers];
}

/// Extractor that succeeds only if the caller holds every permission in `P`
#[derive(Debug, Clone)]
pub struct Authorized<P: PermissionSet>(pub Claims, PhantomData<P>);

impl<P: PermissionSet> Authorized<P> {
    pub fn claims(&self) -> &Claims {
        &self.0
    }
}

#[async_trait]
impl<S, P> FromRequestParts<S> for Authorized<P>
where
    AppState: FromRef<S>,
    S: Send + Sync,
    P: PermissionSet,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(context) = AuthContext::from_request_parts(parts, state).await;
        let claims = context.require_all(P::REQUIRED)?.clone();
        Ok(Authorized(claims, PhantomData))
    }
}

// =============================================================================
// Cookies
// =============================================================================

/// Session cookie: HttpOnly, Secure, SameSite=Lax, scoped to `/`
pub fn session_cookie(token: &str, max_age_seconds: i64) -> Result<Cookie<'static>, AppError> {
    build_cookie(SESSION_COOKIE, token, max_age_seconds)
}

/// Expired cookie that clears the session in the browser
pub fn clear_session_cookie() -> Result<Cookie<'static>, AppError> {
    build_cookie(SESSION_COOKIE, "", 0)
}

pub(crate) fn build_cookie(
    name: &str,
    value: &str,
    max_age_seconds: i64,
) -> Result<Cookie<'static>, AppError> {
    Cookie::parse(format!(
        "{name}={value}; Max-Age={max_age_seconds}; Path=/; HttpOnly; Secure; SameSite=Lax"
    ))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build cookie {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Role;
    use axum::http::header;
    use axum_extra::extract::cookie::SameSite;

    fn context(role: Option<Role>) -> AuthContext {
        AuthContext(role.map(|role| Claims {
            sub: "account".to_string(),
            role,
        }))
    }

    #[test]
    fn anonymous_context_is_not_authenticated() {
        let error = context(None).require_authenticated().unwrap_err();
        assert!(matches!(error, AppError::Unauthorized(message) if message == "Not authenticated"));
    }

    #[test]
    fn permission_check_authenticates_first() {
        let error = context(None)
            .require_permission(Permission::ManageUsers)
            .unwrap_err();
        assert!(matches!(error, AppError::Unauthorized(_)));
    }

    #[test]
    fn manage_users_rejects_client_and_accepts_admin() {
        let error = context(Some(Role::Client))
            .require_permission(Permission::ManageUsers)
            .unwrap_err();
        assert!(matches!(
            error,
            AppError::Forbidden(message) if message == "Permission 'manage-users' required"
        ));

        assert!(
            context(Some(Role::Admin))
                .require_permission(Permission::ManageUsers)
                .is_ok()
        );
    }

    #[test]
    fn require_all_needs_every_permission() {
        let all = [Permission::ManageUsers, Permission::ManageScans];
        assert!(context(Some(Role::Admin)).require_all(&all).is_ok());
        assert!(context(Some(Role::Client)).require_all(&all).is_err());
        assert!(context(Some(Role::Client)).require_all(&[]).is_ok());
    }

    #[test]
    fn token_is_read_from_cookie_then_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; access_token=abc".parse().unwrap());
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("abc"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer xyz".parse().unwrap());
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("xyz"));

        assert!(extract_token_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("tok", 2_592_000).unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age().map(|age| age.whole_seconds()), Some(2_592_000));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = clear_session_cookie().unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age().map(|age| age.whole_seconds()), Some(0));
    }
}
