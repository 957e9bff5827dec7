use chrono::Utc;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::menu::{CreateMenuItemRequest, MenuItemList, RestaurantList, UpdateMenuItemRequest},
    entity::{
        menu_items::{
            ActiveModel as MenuItemActive, Column as MenuCol, Entity as MenuItems,
            Model as MenuItemModel,
        },
        restaurants::{Column as RestaurantCol, Entity as Restaurants, Model as RestaurantModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_affiliated, ensure_role},
    models::{MenuItem, Restaurant, UserRole},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_restaurants(state: &AppState) -> AppResult<ApiResponse<RestaurantList>> {
    let items = Restaurants::find()
        .order_by_asc(RestaurantCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(restaurant_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Restaurants",
        RestaurantList { items },
        Some(Meta::empty()),
    ))
}

/// Customers browse what they can order; staff of the restaurant see the
/// whole menu including items currently switched off.
pub async fn list_menu(
    state: &AppState,
    user: Option<&AuthUser>,
    restaurant_id: Uuid,
) -> AppResult<ApiResponse<MenuItemList>> {
    Restaurants::find_by_id(restaurant_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let staff_view = user
        .map(|u| u.role.requires_restaurant() && u.restaurant_id == Some(restaurant_id))
        .unwrap_or(false);

    let mut finder = MenuItems::find().filter(MenuCol::RestaurantId.eq(restaurant_id));
    if !staff_view {
        finder = finder.filter(MenuCol::IsAvailable.eq(true));
    }

    let items = finder
        .order_by_asc(MenuCol::Category)
        .order_by_asc(MenuCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(menu_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Menu",
        MenuItemList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_menu_item(
    state: &AppState,
    user: &AuthUser,
    payload: CreateMenuItemRequest,
) -> AppResult<ApiResponse<MenuItem>> {
    ensure_role(user, UserRole::Manager)?;
    ensure_affiliated(user, payload.restaurant_id)?;

    if payload.price < 0 {
        return Err(AppError::BadRequest("Price cannot be negative".into()));
    }

    let active = MenuItemActive {
        id: Set(Uuid::new_v4()),
        restaurant_id: Set(payload.restaurant_id),
        name: Set(payload.name),
        price: Set(payload.price),
        image: Set(payload.image),
        category: Set(payload.category),
        is_available: Set(payload.is_available.unwrap_or(true)),
        created_at: NotSet,
    };
    let item = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "menu_item_create",
        Some("menu_items"),
        Some(serde_json::json!({ "menu_item_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Menu item created",
        menu_item_from_entity(item),
        Some(Meta::empty()),
    ))
}

pub async fn update_menu_item(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateMenuItemRequest,
) -> AppResult<ApiResponse<MenuItem>> {
    ensure_role(user, UserRole::Manager)?;

    let existing = MenuItems::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(item) => item,
        None => return Err(AppError::NotFound),
    };
    ensure_affiliated(user, existing.restaurant_id)?;

    if payload.price.is_some_and(|price| price < 0) {
        return Err(AppError::BadRequest("Price cannot be negative".into()));
    }

    let mut active: MenuItemActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(image) = payload.image {
        active.image = Set(Some(image));
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(is_available) = payload.is_available {
        active.is_available = Set(is_available);
    }

    let item = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "menu_item_update",
        Some("menu_items"),
        Some(serde_json::json!({ "menu_item_id": item.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        menu_item_from_entity(item),
        Some(Meta::empty()),
    ))
}

fn restaurant_from_entity(model: RestaurantModel) -> Restaurant {
    Restaurant {
        id: model.id,
        name: model.name,
        logo: model.logo,
        is_open: model.is_open,
        delivery_fee: model.delivery_fee,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn menu_item_from_entity(model: MenuItemModel) -> MenuItem {
    MenuItem {
        id: model.id,
        restaurant_id: model.restaurant_id,
        name: model.name,
        price: model.price,
        image: model.image,
        category: model.category,
        is_available: model.is_available,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
