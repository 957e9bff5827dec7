use aklaty_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::orders::{CreateOrderItemRequest, CreateOrderRequest, LocationUpdateRequest},
    entity::{
        menu_items::ActiveModel as MenuItemActive, restaurants::ActiveModel as RestaurantActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, UserRole},
    routes::params::{OrderListQuery, Pagination},
    services::{assignment_service, location_service, order_service, transition_service},
    state::AppState,
};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::ActiveModelTrait;
use uuid::Uuid;

// Each test builds its own restaurants and users, so runs stay independent
// without truncating shared tables.

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    Ok(Some(AppState { pool, orm }))
}

async fn create_restaurant(state: &AppState, label: &str) -> anyhow::Result<Uuid> {
    let restaurant = RestaurantActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("{label} {}", Uuid::new_v4())),
        logo: Set(None),
        is_open: Set(true),
        delivery_fee: Set(500),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(restaurant.id)
}

async fn create_user(
    state: &AppState,
    role: UserRole,
    restaurant_id: Option<Uuid>,
) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(format!("{}+{}@aklaty.test", role.as_str(), Uuid::new_v4())),
        password_hash: Set("dummy".into()),
        name: Set(format!("Test {}", role.as_str())),
        phone: Set(Some("0790000000".into())),
        role: Set(role.as_str().to_owned()),
        restaurant_id: Set(restaurant_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role,
        restaurant_id,
    })
}

async fn create_menu_item(
    state: &AppState,
    restaurant_id: Uuid,
    name: &str,
    price: i64,
) -> anyhow::Result<Uuid> {
    let item = MenuItemActive {
        id: Set(Uuid::new_v4()),
        restaurant_id: Set(restaurant_id),
        name: Set(name.to_owned()),
        price: Set(price),
        image: Set(None),
        category: Set("Plates".into()),
        is_available: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(item.id)
}

async fn place_order(
    state: &AppState,
    customer: &AuthUser,
    restaurant_id: Uuid,
    items: Vec<CreateOrderItemRequest>,
) -> anyhow::Result<Uuid> {
    let resp = order_service::create_order(
        state,
        customer,
        CreateOrderRequest {
            restaurant_id,
            customer_address: "12 Rainbow St, Amman".into(),
            customer_phone: None,
            items,
        },
    )
    .await?;
    Ok(resp.data.unwrap().order.id)
}

fn default_query() -> OrderListQuery {
    OrderListQuery {
        pagination: Pagination {
            page: None,
            per_page: None,
        },
        status: None,
        sort_order: None,
    }
}

// The whole lifecycle: placement, kitchen flow, a two-driver claim race,
// location reports and delivery, with idempotent retries along the way.
#[tokio::test]
async fn full_lifecycle_with_claim_race() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let restaurant = create_restaurant(&state, "Race Grill").await?;
    let manager = create_user(&state, UserRole::Manager, Some(restaurant)).await?;
    let chef = create_user(&state, UserRole::Chef, Some(restaurant)).await?;
    let driver_a = create_user(&state, UserRole::Driver, Some(restaurant)).await?;
    let driver_b = create_user(&state, UserRole::Driver, Some(restaurant)).await?;
    let customer = create_user(&state, UserRole::Customer, None).await?;

    let plate = create_menu_item(&state, restaurant, "Mixed Grill Plate", 5000).await?;
    let wrap = create_menu_item(&state, restaurant, "Falafel Wrap", 2500).await?;

    let order_id = place_order(
        &state,
        &customer,
        restaurant,
        vec![
            CreateOrderItemRequest {
                menu_item_id: plate,
                quantity: 2,
            },
            CreateOrderItemRequest {
                menu_item_id: wrap,
                quantity: 2,
            },
        ],
    )
    .await?;

    let placed = order_service::get_order(&state, &customer, order_id).await?;
    let placed = placed.data.unwrap().order;
    assert_eq!(placed.status, OrderStatus::Pending);
    assert_eq!(placed.total_price, 15_000);
    assert_eq!(placed.version, 1);

    // The kitchen cannot jump the queue while the order is still pending.
    let early = transition_service::update_status(&state, &chef, order_id, OrderStatus::Preparing)
        .await
        .unwrap_err();
    assert!(matches!(early, AppError::InvalidTransition { .. }));

    let accepted =
        transition_service::update_status(&state, &manager, order_id, OrderStatus::Accepted)
            .await?;
    let accepted = accepted.data.unwrap();
    assert_eq!(accepted.status, OrderStatus::Accepted);
    assert_eq!(accepted.version, 2);

    // Retry after a dropped response: same state back, no version bump.
    let retried =
        transition_service::update_status(&state, &manager, order_id, OrderStatus::Accepted)
            .await?;
    let retried = retried.data.unwrap();
    assert_eq!(retried.status, OrderStatus::Accepted);
    assert_eq!(retried.version, 2);

    let preparing =
        transition_service::update_status(&state, &chef, order_id, OrderStatus::Preparing).await?;
    let preparing = preparing.data.unwrap();
    assert_eq!(preparing.status, OrderStatus::Preparing);
    assert_eq!(preparing.chef_id, Some(chef.user_id));

    let ready =
        transition_service::update_status(&state, &chef, order_id, OrderStatus::Ready).await?;
    assert_eq!(ready.data.unwrap().version, 4);

    // Both drivers saw the same ready, unassigned snapshot.
    let (first, second) = tokio::join!(
        assignment_service::claim(&state, &driver_a, order_id),
        assignment_service::claim(&state, &driver_b, order_id),
    );

    let (winner, loser) = match (first, second) {
        (Ok(resp), Err(err)) => {
            assert!(matches!(err, AppError::AlreadyClaimed));
            (resp.data.unwrap(), &driver_b)
        }
        (Err(err), Ok(resp)) => {
            assert!(matches!(err, AppError::AlreadyClaimed));
            (resp.data.unwrap(), &driver_a)
        }
        (Ok(_), Ok(_)) => panic!("both drivers won the claim race"),
        (Err(first), Err(second)) => panic!("no driver won the race: {first:?} / {second:?}"),
    };
    let winner_driver_id = winner.driver_id.expect("winner assigned");
    assert_eq!(winner.status, OrderStatus::OnTheWay);
    assert_eq!(winner.version, 5);
    assert_ne!(winner_driver_id, loser.user_id);

    let winner_auth = if winner_driver_id == driver_a.user_id {
        &driver_a
    } else {
        &driver_b
    };

    // Winner retrying the claim is a no-op, not an error.
    let replay = assignment_service::claim(&state, winner_auth, order_id).await?;
    assert_eq!(replay.data.unwrap().version, 5);

    // Only the assigned driver may deliver.
    let foreign = transition_service::update_status(&state, loser, order_id, OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(foreign, AppError::Forbidden));

    // A driver with no active order is acknowledged and ignored.
    let idle_ack = location_service::report_location(
        &state,
        loser,
        LocationUpdateRequest {
            lat: 31.95,
            lng: 35.91,
        },
    )
    .await?;
    assert_eq!(idle_ack.data.unwrap().order_id, None);

    let moving_ack = location_service::report_location(
        &state,
        winner_auth,
        LocationUpdateRequest {
            lat: 31.95,
            lng: 35.91,
        },
    )
    .await?;
    assert_eq!(moving_ack.data.unwrap().order_id, Some(order_id));

    let tracked = order_service::get_order(&state, &customer, order_id).await?;
    let tracked = tracked.data.unwrap().order;
    let location = tracked.location.expect("last known position");
    assert!((location.lat - 31.95).abs() < f64::EPSILON);
    assert_eq!(tracked.version, 6);

    let delivered =
        transition_service::update_status(&state, winner_auth, order_id, OrderStatus::Delivered)
            .await?;
    let delivered = delivered.data.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.version, 7);

    // Retrying the final call still succeeds without touching the order.
    let replay =
        transition_service::update_status(&state, winner_auth, order_id, OrderStatus::Delivered)
            .await?;
    assert_eq!(replay.data.unwrap().version, 7);

    // The order is closed for everyone now.
    let after = transition_service::update_status(&state, &chef, order_id, OrderStatus::Preparing)
        .await
        .unwrap_err();
    assert!(matches!(after, AppError::OrderClosed));

    let late_claim = assignment_service::claim(&state, loser, order_id)
        .await
        .unwrap_err();
    assert!(matches!(late_claim, AppError::AlreadyClaimed));

    Ok(())
}

#[tokio::test]
async fn rejected_orders_are_closed() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let restaurant = create_restaurant(&state, "Reject Grill").await?;
    let manager = create_user(&state, UserRole::Manager, Some(restaurant)).await?;
    let chef = create_user(&state, UserRole::Chef, Some(restaurant)).await?;
    let driver = create_user(&state, UserRole::Driver, Some(restaurant)).await?;
    let customer = create_user(&state, UserRole::Customer, None).await?;
    let wrap = create_menu_item(&state, restaurant, "Falafel Wrap", 1500).await?;

    let order_id = place_order(
        &state,
        &customer,
        restaurant,
        vec![CreateOrderItemRequest {
            menu_item_id: wrap,
            quantity: 1,
        }],
    )
    .await?;

    let rejected =
        transition_service::update_status(&state, &manager, order_id, OrderStatus::Rejected)
            .await?;
    assert_eq!(rejected.data.unwrap().status, OrderStatus::Rejected);

    let kitchen = transition_service::update_status(&state, &chef, order_id, OrderStatus::Preparing)
        .await
        .unwrap_err();
    assert!(matches!(kitchen, AppError::OrderClosed));

    let claim = assignment_service::claim(&state, &driver, order_id)
        .await
        .unwrap_err();
    assert!(matches!(claim, AppError::OrderClosed));

    Ok(())
}

#[tokio::test]
async fn restaurants_are_isolated_from_each_other() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let restaurant_a = create_restaurant(&state, "Grill A").await?;
    let restaurant_b = create_restaurant(&state, "Grill B").await?;
    let manager_a = create_user(&state, UserRole::Manager, Some(restaurant_a)).await?;
    let chef_b = create_user(&state, UserRole::Chef, Some(restaurant_b)).await?;
    let manager_b = create_user(&state, UserRole::Manager, Some(restaurant_b)).await?;
    let customer = create_user(&state, UserRole::Customer, None).await?;
    let plate = create_menu_item(&state, restaurant_a, "Shawarma Plate", 3000).await?;

    let order_id = place_order(
        &state,
        &customer,
        restaurant_a,
        vec![CreateOrderItemRequest {
            menu_item_id: plate,
            quantity: 1,
        }],
    )
    .await?;

    // Staff of restaurant B can neither mutate nor read restaurant A's order.
    let mutate = transition_service::update_status(&state, &manager_b, order_id, OrderStatus::Accepted)
        .await
        .unwrap_err();
    assert!(matches!(mutate, AppError::Forbidden));

    let read = order_service::get_order(&state, &chef_b, order_id)
        .await
        .unwrap_err();
    assert!(matches!(read, AppError::NotFound));

    let listed = order_service::list_orders(&state, &chef_b, default_query()).await?;
    assert!(
        listed
            .data
            .unwrap()
            .items
            .iter()
            .all(|order| order.restaurant_id == restaurant_b),
        "restaurant B staff saw a foreign order"
    );

    // Restaurant A's manager still sees and accepts it.
    let accepted =
        transition_service::update_status(&state, &manager_a, order_id, OrderStatus::Accepted)
            .await?;
    assert_eq!(accepted.data.unwrap().status, OrderStatus::Accepted);

    Ok(())
}

#[tokio::test]
async fn drivers_see_claimable_orders_and_their_own_only() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let restaurant = create_restaurant(&state, "Visible Grill").await?;
    let manager = create_user(&state, UserRole::Manager, Some(restaurant)).await?;
    let chef = create_user(&state, UserRole::Chef, Some(restaurant)).await?;
    let driver_a = create_user(&state, UserRole::Driver, Some(restaurant)).await?;
    let driver_b = create_user(&state, UserRole::Driver, Some(restaurant)).await?;
    let customer = create_user(&state, UserRole::Customer, None).await?;
    let plate = create_menu_item(&state, restaurant, "Grill Plate", 4000).await?;

    let order_id = place_order(
        &state,
        &customer,
        restaurant,
        vec![CreateOrderItemRequest {
            menu_item_id: plate,
            quantity: 1,
        }],
    )
    .await?;

    // Not visible to drivers until it is ready.
    let before = order_service::list_orders(&state, &driver_a, default_query()).await?;
    assert!(
        before
            .data
            .unwrap()
            .items
            .iter()
            .all(|order| order.id != order_id)
    );

    transition_service::update_status(&state, &manager, order_id, OrderStatus::Accepted).await?;
    transition_service::update_status(&state, &chef, order_id, OrderStatus::Preparing).await?;
    transition_service::update_status(&state, &chef, order_id, OrderStatus::Ready).await?;

    // Ready and unassigned: both drivers can see it.
    for driver in [&driver_a, &driver_b] {
        let visible = order_service::list_orders(&state, driver, default_query()).await?;
        assert!(
            visible
                .data
                .unwrap()
                .items
                .iter()
                .any(|order| order.id == order_id)
        );
    }

    assignment_service::claim(&state, &driver_a, order_id).await?;

    // Claimed: gone for the other driver, still visible to its own.
    let other = order_service::list_orders(&state, &driver_b, default_query()).await?;
    assert!(
        other
            .data
            .unwrap()
            .items
            .iter()
            .all(|order| order.id != order_id)
    );

    let own = order_service::list_orders(&state, &driver_a, default_query()).await?;
    assert!(
        own.data
            .unwrap()
            .items
            .iter()
            .any(|order| order.id == order_id)
    );

    Ok(())
}
