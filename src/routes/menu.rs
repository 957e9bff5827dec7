use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{patch, post},
};
use uuid::Uuid;

use crate::{
    dto::menu::{CreateMenuItemRequest, UpdateMenuItemRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::MenuItem,
    response::ApiResponse,
    services::menu_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_menu_item))
        .route("/{id}", patch(update_menu_item))
}

#[utoipa::path(
    post,
    path = "/api/menu",
    request_body = CreateMenuItemRequest,
    responses(
        (status = 200, description = "Create menu item", body = ApiResponse<MenuItem>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Menu"
)]
pub async fn create_menu_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateMenuItemRequest>,
) -> AppResult<Json<ApiResponse<MenuItem>>> {
    let resp = menu_service::create_menu_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/menu/{id}",
    params(
        ("id" = Uuid, Path, description = "Menu item ID")
    ),
    request_body = UpdateMenuItemRequest,
    responses(
        (status = 200, description = "Update menu item", body = ApiResponse<MenuItem>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Menu"
)]
pub async fn update_menu_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMenuItemRequest>,
) -> AppResult<Json<ApiResponse<MenuItem>>> {
    let resp = menu_service::update_menu_item(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
