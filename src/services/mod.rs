pub mod admin_service;
pub mod assignment_service;
pub mod auth_service;
pub mod location_service;
pub mod menu_service;
pub mod order_service;
pub mod transition_service;
