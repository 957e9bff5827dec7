use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::menu::{MenuItemList, RestaurantList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::menu_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_restaurants))
        .route("/{id}/menu", get(restaurant_menu))
}

#[utoipa::path(
    get,
    path = "/api/restaurants",
    responses(
        (status = 200, description = "List restaurants", body = ApiResponse<RestaurantList>)
    ),
    tag = "Restaurants"
)]
pub async fn list_restaurants(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<RestaurantList>>> {
    let resp = menu_service::list_restaurants(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/restaurants/{id}/menu",
    params(
        ("id" = Uuid, Path, description = "Restaurant ID")
    ),
    responses(
        (status = 200, description = "Restaurant menu", body = ApiResponse<MenuItemList>),
        (status = 404, description = "Not Found")
    ),
    tag = "Restaurants"
)]
pub async fn restaurant_menu(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MenuItemList>>> {
    let resp = menu_service::list_menu(&state, user.as_ref(), id).await?;
    Ok(Json(resp))
}
