use std::collections::HashMap;

use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems},
    entity::{
        menu_items::{Column as MenuCol, Entity as MenuItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        restaurants::Entity as Restaurants,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{GeoPoint, Order, OrderItem, OrderStatus, UserRole},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// The per-role visible subset. Drivers see their restaurant's claimable
/// orders plus whatever is assigned to them, never another driver's delivery.
pub(crate) fn visible_orders(user: &AuthUser) -> AppResult<Condition> {
    let condition = match user.role {
        UserRole::Admin => Condition::all(),
        UserRole::Customer => Condition::all().add(OrderCol::CustomerId.eq(user.user_id)),
        UserRole::Manager | UserRole::Chef => {
            let restaurant_id = user.restaurant_id.ok_or(AppError::Forbidden)?;
            Condition::all().add(OrderCol::RestaurantId.eq(restaurant_id))
        }
        UserRole::Driver => {
            let restaurant_id = user.restaurant_id.ok_or(AppError::Forbidden)?;
            Condition::all().add(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(OrderCol::RestaurantId.eq(restaurant_id))
                            .add(OrderCol::Status.eq(OrderStatus::Ready.as_str()))
                            .add(OrderCol::DriverId.is_null()),
                    )
                    .add(OrderCol::DriverId.eq(user.user_id)),
            )
        }
    };
    Ok(condition)
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = visible_orders(user)?;
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<Order>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let condition = visible_orders(user)?.add(OrderCol::Id.eq(id));
    let order = Orders::find().filter(condition).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// The single entry point that creates an order. Name and price are
/// snapshotted from the menu so later edits never rewrite history.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_role(user, UserRole::Customer)?;

    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }
    if payload.items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::BadRequest("Order has invalid quantity".into()));
    }
    if payload.customer_address.trim().is_empty() {
        return Err(AppError::BadRequest("Delivery address is required".into()));
    }

    let customer = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Forbidden)?;

    let txn = state.orm.begin().await?;

    let restaurant = Restaurants::find_by_id(payload.restaurant_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    if !restaurant.is_open {
        return Err(AppError::BadRequest("Restaurant is closed".into()));
    }

    let menu_ids: Vec<Uuid> = payload.items.iter().map(|item| item.menu_item_id).collect();
    let menu: HashMap<Uuid, _> = MenuItems::find()
        .filter(MenuCol::RestaurantId.eq(restaurant.id))
        .filter(MenuCol::Id.is_in(menu_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|item| (item.id, item))
        .collect();

    let mut total_price: i64 = 0;
    for line in &payload.items {
        let menu_item = menu
            .get(&line.menu_item_id)
            .ok_or_else(|| AppError::BadRequest("Unknown menu item".into()))?;
        if !menu_item.is_available {
            return Err(AppError::BadRequest(format!(
                "Menu item {} is unavailable",
                menu_item.name
            )));
        }
        total_price += menu_item.price * (line.quantity as i64);
    }

    let customer_phone = payload
        .customer_phone
        .or(customer.phone.clone())
        .unwrap_or_default();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(customer.id),
        customer_name: Set(customer.name.clone()),
        customer_phone: Set(customer_phone),
        customer_address: Set(payload.customer_address),
        restaurant_id: Set(restaurant.id),
        restaurant_name: Set(restaurant.name.clone()),
        chef_id: Set(None),
        driver_id: Set(None),
        status: Set(OrderStatus::Pending.as_str().to_owned()),
        total_price: Set(total_price),
        version: Set(1),
        driver_lat: Set(None),
        driver_lng: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    for line in &payload.items {
        let menu_item = &menu[&line.menu_item_id];
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            menu_item_id: Set(menu_item.id),
            name: Set(menu_item.name.clone()),
            quantity: Set(line.quantity),
            price: Set(menu_item.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        order_items.push(order_item_from_entity(item));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_price": total_price })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: order_from_entity(order)?,
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = OrderStatus::parse(&model.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown order status {:?}", model.status))
    })?;
    let location = match (model.driver_lat, model.driver_lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    };

    Ok(Order {
        id: model.id,
        customer_id: model.customer_id,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        customer_address: model.customer_address,
        restaurant_id: model.restaurant_id,
        restaurant_name: model.restaurant_name,
        chef_id: model.chef_id,
        driver_id: model.driver_id,
        status,
        total_price: model.total_price,
        version: model.version,
        location,
        created_at: model.created_at.with_timezone(&chrono::Utc),
        updated_at: model.updated_at.with_timezone(&chrono::Utc),
    })
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        menu_item_id: model.menu_item_id,
        name: model.name,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&chrono::Utc),
    }
}
