use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::begin_order_txn,
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_affiliated},
    models::{Order, OrderStatus, UserRole},
    response::{ApiResponse, Meta},
    services::order_service::order_from_entity,
    state::AppState,
};

/// Outcome of validating a requested status change against the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Re-submission of the current status; succeed without touching the row.
    Noop,
    /// A legal edge; apply it.
    Apply,
}

/// Pure lifecycle check: role gate first, then the idempotent no-op, then the
/// terminal wall, then the edge table. Claims take the ready→on_the_way edge
/// through the assignment path, never through here.
pub fn validate_transition(
    current: OrderStatus,
    requested: OrderStatus,
    role: UserRole,
) -> Result<TransitionKind, AppError> {
    let Some(required) = requested.transition_role() else {
        return Err(AppError::BadRequest(
            "Orders cannot be moved back to pending".into(),
        ));
    };
    if role != required {
        return Err(AppError::Forbidden);
    }
    if current == requested {
        return Ok(TransitionKind::Noop);
    }
    if current.is_terminal() {
        return Err(AppError::OrderClosed);
    }
    if !current.can_become(requested) {
        return Err(AppError::InvalidTransition {
            from: current,
            to: requested,
        });
    }
    if requested == OrderStatus::OnTheWay {
        return Err(AppError::BadRequest(
            "Ready orders are claimed by a driver, not transitioned".into(),
        ));
    }
    Ok(TransitionKind::Apply)
}

/// Commit a status change for one order. The row lock serializes concurrent
/// requests for the same order; of two conflicting submissions against the
/// same source status, the second sees the new status and fails the edge
/// check instead of overwriting.
pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    requested: OrderStatus,
) -> AppResult<ApiResponse<Order>> {
    let txn = begin_order_txn(&state.orm).await?;

    let order = Orders::find()
        .filter(OrderCol::Id.eq(id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let current = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown order status {:?}", order.status))
    })?;

    // Staff from another restaurant are turned away before they learn
    // anything about the order's state.
    match user.role {
        UserRole::Manager | UserRole::Chef | UserRole::Driver => {
            ensure_affiliated(user, order.restaurant_id)?
        }
        UserRole::Admin | UserRole::Customer => return Err(AppError::Forbidden),
    }

    let kind = validate_transition(current, requested, user.role)?;

    // Only the driver that claimed the order may move or re-submit it.
    if user.role == UserRole::Driver && order.driver_id != Some(user.user_id) {
        return Err(AppError::Forbidden);
    }

    if kind == TransitionKind::Noop {
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "No change",
            order_from_entity(order)?,
            Some(Meta::empty()),
        ));
    }

    let version = order.version;
    let mut active: OrderActive = order.into();
    active.status = Set(requested.as_str().to_owned());
    active.version = Set(version + 1);
    active.updated_at = Set(Utc::now().into());
    if requested == OrderStatus::Preparing {
        active.chef_id = Set(Some(user.user_id));
    }
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "from": current.as_str(),
            "to": requested.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}
