use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::{
    dto::orders::{LocationAck, LocationUpdateRequest},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{OrderStatus, UserRole},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Attach the driver's latest position to their active delivery. Only the
/// last known position is kept; each report overwrites the previous one. A
/// report from a driver with no active order is acknowledged and dropped so
/// a client that has not yet noticed its delivery completed keeps working.
pub async fn report_location(
    state: &AppState,
    user: &AuthUser,
    payload: LocationUpdateRequest,
) -> AppResult<ApiResponse<LocationAck>> {
    ensure_role(user, UserRole::Driver)?;

    if !payload.lat.is_finite() || !(-90.0..=90.0).contains(&payload.lat) {
        return Err(AppError::BadRequest("Latitude out of range".into()));
    }
    if !payload.lng.is_finite() || !(-180.0..=180.0).contains(&payload.lng) {
        return Err(AppError::BadRequest("Longitude out of range".into()));
    }

    let active = Orders::find()
        .filter(OrderCol::DriverId.eq(user.user_id))
        .filter(OrderCol::Status.eq(OrderStatus::OnTheWay.as_str()))
        .one(&state.orm)
        .await?;

    let Some(order) = active else {
        return Ok(ApiResponse::success(
            "No active delivery",
            LocationAck { order_id: None },
            Some(Meta::empty()),
        ));
    };

    // Keyed on the status so a delivery that completed between the read and
    // the write is left untouched and the report is simply dropped.
    let result = Orders::update_many()
        .col_expr(OrderCol::DriverLat, Expr::value(payload.lat))
        .col_expr(OrderCol::DriverLng, Expr::value(payload.lng))
        .col_expr(OrderCol::Version, Expr::col(OrderCol::Version).add(1))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(OrderStatus::OnTheWay.as_str()))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Ok(ApiResponse::success(
            "No active delivery",
            LocationAck { order_id: None },
            Some(Meta::empty()),
        ));
    }

    tracing::debug!(order_id = %order.id, lat = payload.lat, lng = payload.lng, "driver location updated");

    Ok(ApiResponse::success(
        "Location recorded",
        LocationAck {
            order_id: Some(order.id),
        },
        Some(Meta::empty()),
    ))
}
