use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::begin_order_txn,
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_affiliated, ensure_role},
    models::{Order, OrderStatus, UserRole},
    response::{ApiResponse, Meta},
    services::order_service::order_from_entity,
    state::AppState,
};

/// A driver takes ownership of a ready, unassigned order. Assignment and the
/// move to on_the_way happen in one step under the order's row lock, so of
/// any number of concurrent claims exactly one wins; the rest observe the
/// assigned row and get `AlreadyClaimed`.
pub async fn claim(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    ensure_role(user, UserRole::Driver)?;

    let txn = begin_order_txn(&state.orm).await?;

    let order = Orders::find()
        .filter(OrderCol::Id.eq(id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    ensure_affiliated(user, order.restaurant_id)?;

    let current = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown order status {:?}", order.status))
    })?;

    match current {
        OrderStatus::Ready if order.driver_id.is_none() => {}
        OrderStatus::Ready => return Err(AppError::AlreadyClaimed),
        OrderStatus::OnTheWay if order.driver_id == Some(user.user_id) => {
            // The winner retrying after a dropped response.
            txn.commit().await?;
            return Ok(ApiResponse::success(
                "No change",
                order_from_entity(order)?,
                Some(Meta::empty()),
            ));
        }
        OrderStatus::OnTheWay => return Err(AppError::AlreadyClaimed),
        OrderStatus::Delivered if order.driver_id == Some(user.user_id) => {
            return Err(AppError::OrderClosed);
        }
        OrderStatus::Delivered => return Err(AppError::AlreadyClaimed),
        OrderStatus::Rejected => return Err(AppError::OrderClosed),
        OrderStatus::Pending | OrderStatus::Accepted | OrderStatus::Preparing => {
            return Err(AppError::InvalidTransition {
                from: current,
                to: OrderStatus::OnTheWay,
            });
        }
    }

    // One delivery at a time per driver; this keeps the location tracker's
    // "single active order" assumption true.
    let carrying = Orders::find()
        .filter(OrderCol::DriverId.eq(user.user_id))
        .filter(OrderCol::Status.eq(OrderStatus::OnTheWay.as_str()))
        .count(&txn)
        .await?;
    if carrying > 0 {
        return Err(AppError::BadRequest(
            "Driver already has an active delivery".into(),
        ));
    }

    let version = order.version;
    let mut active: OrderActive = order.into();
    active.driver_id = Set(Some(user.user_id));
    active.status = Set(OrderStatus::OnTheWay.as_str().to_owned());
    active.version = Set(version + 1);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_claim",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order claimed",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}
