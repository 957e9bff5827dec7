use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth as auth_dto,
        menu::{MenuItemList, RestaurantList},
        orders::{
            CreateOrderItemRequest, CreateOrderRequest, LocationAck, LocationUpdateRequest,
            OrderList, OrderWithItems, UpdateOrderStatusRequest,
        },
    },
    dto::menu::{CreateMenuItemRequest, UpdateMenuItemRequest},
    models::{GeoPoint, MenuItem, Order, OrderItem, OrderStatus, Restaurant, User, UserRole},
    response::{ApiResponse, Meta},
    routes::{admin, auth, driver, health, menu, orders, params, restaurants},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        auth::me,
        restaurants::list_restaurants,
        restaurants::restaurant_menu,
        menu::create_menu_item,
        menu::update_menu_item,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order_status,
        orders::claim_order,
        driver::update_location,
        admin::list_all_orders,
        admin::get_order_admin
    ),
    components(
        schemas(
            User,
            UserRole,
            Restaurant,
            MenuItem,
            Order,
            OrderItem,
            OrderStatus,
            GeoPoint,
            auth_dto::RegisterRequest,
            auth_dto::LoginRequest,
            auth_dto::LoginResponse,
            CreateOrderRequest,
            CreateOrderItemRequest,
            UpdateOrderStatusRequest,
            LocationUpdateRequest,
            LocationAck,
            OrderList,
            OrderWithItems,
            CreateMenuItemRequest,
            UpdateMenuItemRequest,
            MenuItemList,
            RestaurantList,
            admin::AdminOrderListQuery,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<MenuItemList>,
            ApiResponse<RestaurantList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Restaurants", description = "Restaurant and menu browsing"),
        (name = "Menu", description = "Menu management"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Driver", description = "Driver location reporting"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
