use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{MenuItem, Restaurant};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMenuItemRequest {
    pub restaurant_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: Option<String>,
    pub category: String,
    pub is_available: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MenuItemList {
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RestaurantList {
    pub items: Vec<Restaurant>,
}
