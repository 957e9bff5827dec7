use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem, OrderStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub menu_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub restaurant_id: Uuid,
    pub customer_address: String,
    pub customer_phone: Option<String>,
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LocationUpdateRequest {
    pub lat: f64,
    pub lng: f64,
}

/// A location report is acknowledged even when the driver has no active
/// delivery; `order_id` says which order, if any, the position landed on.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationAck {
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
