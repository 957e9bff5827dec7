use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::orders::{LocationAck, LocationUpdateRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::location_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/location", post(update_location))
}

#[utoipa::path(
    post,
    path = "/api/driver/location",
    request_body = LocationUpdateRequest,
    responses(
        (status = 200, description = "Location acknowledged", body = ApiResponse<LocationAck>),
        (status = 400, description = "Coordinate out of range"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Driver"
)]
pub async fn update_location(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<LocationUpdateRequest>,
) -> AppResult<Json<ApiResponse<LocationAck>>> {
    let resp = location_service::report_location(&state, &user, payload).await?;
    Ok(Json(resp))
}
