use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Chef,
    Driver,
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Chef => "chef",
            UserRole::Driver => "driver",
            UserRole::Customer => "customer",
        }
    }

    pub fn parse(value: &str) -> Option<UserRole> {
        match value {
            "admin" => Some(UserRole::Admin),
            "manager" => Some(UserRole::Manager),
            "chef" => Some(UserRole::Chef),
            "driver" => Some(UserRole::Driver),
            "customer" => Some(UserRole::Customer),
            _ => None,
        }
    }

    /// Roles that only make sense attached to a restaurant.
    pub fn requires_restaurant(&self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Chef | UserRole::Driver)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Preparing,
    Ready,
    OnTheWay,
    Delivered,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "accepted" => Some(OrderStatus::Accepted),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "on_the_way" => Some(OrderStatus::OnTheWay),
            "delivered" => Some(OrderStatus::Delivered),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }

    /// No transition ever leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Rejected)
    }

    /// The lifecycle edge table. Everything not listed here is illegal.
    pub fn can_become(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Accepted)
                | (OrderStatus::Pending, OrderStatus::Rejected)
                | (OrderStatus::Accepted, OrderStatus::Preparing)
                | (OrderStatus::Preparing, OrderStatus::Ready)
                | (OrderStatus::Ready, OrderStatus::OnTheWay)
                | (OrderStatus::OnTheWay, OrderStatus::Delivered)
        )
    }

    /// Which role moves an order *into* this status. Each target status has a
    /// single producing role, so a retry of a dropped response authorizes the
    /// same way the original submission did.
    pub fn transition_role(&self) -> Option<UserRole> {
        match self {
            OrderStatus::Pending => None,
            OrderStatus::Accepted | OrderStatus::Rejected => Some(UserRole::Manager),
            OrderStatus::Preparing | OrderStatus::Ready => Some(UserRole::Chef),
            OrderStatus::OnTheWay | OrderStatus::Delivered => Some(UserRole::Driver),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub restaurant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub logo: Option<String>,
    pub is_open: bool,
    pub delivery_fee: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub price: i64,
    pub image: Option<String>,
    pub category: String,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    pub chef_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub status: OrderStatus,
    pub total_price: i64,
    pub version: i64,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}
