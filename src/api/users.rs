//! User directory endpoints
//!
//! Every route requires the `manage-users` permission, and the caller's own
//! account must still exist.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    middleware,
    routing::get,
};
use serde::Deserialize;

use super::envelope::{ApiResponse, MessageResponse, PaginationMeta};
use crate::AppState;
use crate::auth::{Authorized, ManageUsers, attach_auth_context};
use crate::data::{AccountChanges, AccountPage, PublicAccount, Role};
use crate::error::AppError;
use crate::service::user::DEFAULT_PAGE_SIZE;

/// Create users router
///
/// Routes:
/// - GET /users - Paginated account list
/// - GET /users/:id - Single account
/// - PATCH /users/:id - Partial update
/// - DELETE /users/:id - Hard delete
pub fn users_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/", get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state, attach_auth_context))
}

/// Query parameters for GET /users
#[derive(Debug, Deserialize)]
struct ListUsersQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_size")]
    size: u32,
    role: Option<Role>,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

type ManageUsersCaller = Authorized<ManageUsers>;

async fn ensure_caller_exists(state: &AppState, caller: &ManageUsersCaller) -> Result<(), AppError> {
    state.users.get_user(&caller.claims().sub).await.map(|_| ())
}

/// GET /users
async fn list_users(
    State(state): State<AppState>,
    caller: ManageUsersCaller,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<ApiResponse<AccountPage>, AppError> {
    ensure_caller_exists(&state, &caller).await?;
    let Query(query) = query?;

    let page = state
        .users
        .list_users(query.page, query.size, query.role)
        .await?;
    let pagination = PaginationMeta::from(&page);
    Ok(ApiResponse::success(page).with_pagination(pagination))
}

/// GET /users/:id
async fn get_user(
    State(state): State<AppState>,
    caller: ManageUsersCaller,
    id: Result<Path<String>, PathRejection>,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    ensure_caller_exists(&state, &caller).await?;
    let Path(id) = id?;

    Ok(ApiResponse::success(state.users.get_user(&id).await?))
}

/// PATCH /users/:id
///
/// Accepts any subset of `email`, `display_name`, `role`, `is_active`.
async fn update_user(
    State(state): State<AppState>,
    caller: ManageUsersCaller,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<AccountChanges>, JsonRejection>,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    ensure_caller_exists(&state, &caller).await?;
    let Path(id) = id?;
    let Json(changes) = body?;

    tracing::info!(actor = %caller.claims().sub, target = %id, "Updating account");
    Ok(ApiResponse::success(
        state.users.update_user(&id, changes).await?,
    ))
}

/// DELETE /users/:id
async fn delete_user(
    State(state): State<AppState>,
    caller: ManageUsersCaller,
    id: Result<Path<String>, PathRejection>,
) -> Result<ApiResponse<MessageResponse>, AppError> {
    ensure_caller_exists(&state, &caller).await?;
    let Path(id) = id?;

    tracing::info!(actor = %caller.claims().sub, target = %id, "Deleting account");
    state.users.delete_user(&id).await?;
    Ok(ApiResponse::success(MessageResponse::new(
        "User deleted successfully",
    )))
}
