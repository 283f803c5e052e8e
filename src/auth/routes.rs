//! Authentication endpoints
//!
//! Routes (mounted under /api/v1):
//! - POST /auth/admin/login - Email/password login for admins
//! - GET /auth/github/authorize - GitHub consent URL plus CSRF state
//! - GET /auth/github/callback - OAuth callback, redirects to the dashboard
//! - POST /auth/logout - Clear the session cookie
//! - GET /auth/me - Current account

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use super::middleware::{
    CurrentUser, attach_auth_context, build_cookie, clear_session_cookie, session_cookie,
};
use super::oauth::generate_state;
use crate::AppState;
use crate::api::{ApiResponse, MessageResponse};
use crate::data::{PublicAccount, Role};
use crate::error::AppError;
use crate::service::user::normalize_email;

/// Cookie binding the callback to the browser that started the flow
const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_MAX_AGE_SECONDS: i64 = 10 * 60;

/// Create authentication router
pub fn auth_router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/github/authorize", get(github_authorize))
        .route("/auth/github/callback", get(github_callback));

    let session = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, attach_auth_context));

    public.merge(session)
}

// =============================================================================
// Admin login
// =============================================================================

#[derive(Debug, Deserialize)]
struct AdminLoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    message: &'static str,
    user_id: String,
    role: Role,
}

/// POST /auth/admin/login
async fn admin_login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body?;
    let email = normalize_email(&body.email)?;
    if body.password.is_empty() {
        return Err(AppError::field_validation("password", "field required"));
    }

    let (token, account) = state.auth.authenticate_admin(&email, &body.password).await?;
    let cookie = session_cookie(&token, state.config.auth.cookie_max_age_seconds)?;

    Ok((
        jar.add(cookie),
        ApiResponse::success(LoginResponse {
            message: "Login successful",
            user_id: account.id,
            role: account.role,
        }),
    ))
}

// =============================================================================
// GitHub OAuth
// =============================================================================

#[derive(Debug, Serialize)]
struct AuthorizeResponse {
    authorize_url: String,
    state: String,
}

/// GET /auth/github/authorize
///
/// The state is returned in the body and also pinned in a short-lived cookie.
async fn github_authorize(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_state();
    let authorize_url = state.oauth.authorize_url(&csrf_state)?;
    let cookie = build_cookie(OAUTH_STATE_COOKIE, &csrf_state, OAUTH_STATE_MAX_AGE_SECONDS)?;

    Ok((
        jar.add(cookie),
        ApiResponse::success(AuthorizeResponse {
            authorize_url,
            state: csrf_state,
        }),
    ))
}

/// Query parameters from GitHub callback
#[derive(Debug, Deserialize)]
struct GitHubCallbackQuery {
    /// Authorization code
    code: String,
    /// CSRF state token
    state: Option<String>,
}

/// GET /auth/github/callback
///
/// # Steps
/// 1. Require the state to match the `oauth_state` cookie set by authorize
/// 2. Exchange the code for a GitHub access token
/// 3. Fetch the GitHub profile
/// 4. Encrypt the access token and resolve the local account
/// 5. Set the session cookie and redirect to the dashboard
async fn github_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    query: Result<Query<GitHubCallbackQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;

    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty());
    match (expected, query.state.as_deref()) {
        (Some(expected), Some(state)) if expected == state => {}
        (expected, _) => {
            tracing::warn!(
                cookie_present = expected.is_some(),
                "OAuth callback state does not match cookie"
            );
            return Err(AppError::unauthorized("Invalid OAuth state"));
        }
    }

    let github_token = state.oauth.exchange_code(&query.code).await?;
    let profile = state.oauth.fetch_profile(&github_token).await?;
    let encrypted = state.cipher.encrypt(&github_token)?;

    let (token, _account) = state.auth.authenticate_github(&profile, &encrypted).await?;
    let jar = jar
        .add(session_cookie(&token, state.config.auth.cookie_max_age_seconds)?)
        .add(build_cookie(OAUTH_STATE_COOKIE, "", 0)?);

    let dashboard = format!(
        "{}/dashboard",
        state.config.server.frontend_url.trim_end_matches('/')
    );
    Ok((StatusCode::FOUND, jar, [(header::LOCATION, dashboard)]))
}

// =============================================================================
// Session
// =============================================================================

/// POST /auth/logout
async fn logout(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    state.auth.current_account(&claims).await?;
    tracing::info!(account_id = %claims.sub, "Logged out");

    Ok((
        jar.add(clear_session_cookie()?),
        ApiResponse::success(MessageResponse::new("Logged out successfully")),
    ))
}

#[derive(Debug, Serialize)]
struct MeResponse {
    user: PublicAccount,
}

/// GET /auth/me
async fn me(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<ApiResponse<MeResponse>, AppError> {
    let user = state.auth.current_account(&claims).await?;
    Ok(ApiResponse::success(MeResponse { user }))
}
