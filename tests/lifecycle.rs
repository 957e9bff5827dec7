use aklaty_api::error::AppError;
use aklaty_api::models::{OrderStatus, UserRole};
use aklaty_api::services::transition_service::{TransitionKind, validate_transition};

const ALL_STATUSES: [OrderStatus; 7] = [
    OrderStatus::Pending,
    OrderStatus::Accepted,
    OrderStatus::Preparing,
    OrderStatus::Ready,
    OrderStatus::OnTheWay,
    OrderStatus::Delivered,
    OrderStatus::Rejected,
];

#[test]
fn edge_table_is_exact() {
    let legal = [
        (OrderStatus::Pending, OrderStatus::Accepted),
        (OrderStatus::Pending, OrderStatus::Rejected),
        (OrderStatus::Accepted, OrderStatus::Preparing),
        (OrderStatus::Preparing, OrderStatus::Ready),
        (OrderStatus::Ready, OrderStatus::OnTheWay),
        (OrderStatus::OnTheWay, OrderStatus::Delivered),
    ];

    for from in ALL_STATUSES {
        for to in ALL_STATUSES {
            assert_eq!(
                from.can_become(to),
                legal.contains(&(from, to)),
                "unexpected edge verdict for {from} -> {to}"
            );
        }
    }
}

#[test]
fn terminal_statuses() {
    for status in ALL_STATUSES {
        let expected = matches!(status, OrderStatus::Delivered | OrderStatus::Rejected);
        assert_eq!(status.is_terminal(), expected, "{status}");
    }
}

#[test]
fn status_strings_round_trip() {
    for status in ALL_STATUSES {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("paid"), None);
}

#[test]
fn each_target_status_has_one_producing_role() {
    assert_eq!(OrderStatus::Pending.transition_role(), None);
    assert_eq!(
        OrderStatus::Accepted.transition_role(),
        Some(UserRole::Manager)
    );
    assert_eq!(
        OrderStatus::Rejected.transition_role(),
        Some(UserRole::Manager)
    );
    assert_eq!(
        OrderStatus::Preparing.transition_role(),
        Some(UserRole::Chef)
    );
    assert_eq!(OrderStatus::Ready.transition_role(), Some(UserRole::Chef));
    assert_eq!(
        OrderStatus::OnTheWay.transition_role(),
        Some(UserRole::Driver)
    );
    assert_eq!(
        OrderStatus::Delivered.transition_role(),
        Some(UserRole::Driver)
    );
}

#[test]
fn manager_decides_pending_orders() {
    assert_eq!(
        validate_transition(OrderStatus::Pending, OrderStatus::Accepted, UserRole::Manager)
            .unwrap(),
        TransitionKind::Apply
    );
    assert_eq!(
        validate_transition(OrderStatus::Pending, OrderStatus::Rejected, UserRole::Manager)
            .unwrap(),
        TransitionKind::Apply
    );
}

#[test]
fn wrong_role_is_forbidden_not_invalid() {
    assert!(matches!(
        validate_transition(OrderStatus::Pending, OrderStatus::Accepted, UserRole::Chef),
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        validate_transition(OrderStatus::Accepted, OrderStatus::Preparing, UserRole::Manager),
        Err(AppError::Forbidden)
    ));
    // Customers and admins never drive the lifecycle.
    for role in [UserRole::Customer, UserRole::Admin] {
        assert!(matches!(
            validate_transition(OrderStatus::Pending, OrderStatus::Accepted, role),
            Err(AppError::Forbidden)
        ));
    }
}

#[test]
fn resubmitting_the_current_status_is_a_noop() {
    assert_eq!(
        validate_transition(OrderStatus::Accepted, OrderStatus::Accepted, UserRole::Manager)
            .unwrap(),
        TransitionKind::Noop
    );
    // Retrying the final call after a dropped response also succeeds.
    assert_eq!(
        validate_transition(OrderStatus::Delivered, OrderStatus::Delivered, UserRole::Driver)
            .unwrap(),
        TransitionKind::Noop
    );
}

#[test]
fn terminal_orders_are_closed() {
    assert!(matches!(
        validate_transition(OrderStatus::Rejected, OrderStatus::Preparing, UserRole::Chef),
        Err(AppError::OrderClosed)
    ));
    assert!(matches!(
        validate_transition(OrderStatus::Delivered, OrderStatus::Ready, UserRole::Chef),
        Err(AppError::OrderClosed)
    ));
}

#[test]
fn off_table_edges_are_invalid() {
    assert!(matches!(
        validate_transition(OrderStatus::Pending, OrderStatus::Ready, UserRole::Chef),
        Err(AppError::InvalidTransition { .. })
    ));
    assert!(matches!(
        validate_transition(OrderStatus::Accepted, OrderStatus::Delivered, UserRole::Driver),
        Err(AppError::InvalidTransition { .. })
    ));
    // The lifecycle never walks backwards.
    assert!(matches!(
        validate_transition(OrderStatus::Ready, OrderStatus::Preparing, UserRole::Chef),
        Err(AppError::InvalidTransition { .. })
    ));
}

#[test]
fn nothing_returns_to_pending() {
    assert!(matches!(
        validate_transition(OrderStatus::Accepted, OrderStatus::Pending, UserRole::Manager),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn ready_orders_are_claimed_not_transitioned() {
    assert!(matches!(
        validate_transition(OrderStatus::Ready, OrderStatus::OnTheWay, UserRole::Driver),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn role_strings_round_trip() {
    for role in [
        UserRole::Admin,
        UserRole::Manager,
        UserRole::Chef,
        UserRole::Driver,
        UserRole::Customer,
    ] {
        assert_eq!(UserRole::parse(role.as_str()), Some(role));
    }
    assert_eq!(UserRole::parse("waiter"), None);
}
