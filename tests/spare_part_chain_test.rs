mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use medequip_api::{
    auth::{AuthenticatedUser, Role},
    commands::spare_parts::{
        check_availability_command::CheckAvailabilityCommand,
        create_spare_part_request_command::CreateSparePartRequestCommand,
        customer_decision_command::CustomerDecisionCommand,
        mark_delivered_command::MarkDeliveredCommand, mark_ready_command::MarkReadyCommand,
        set_price_command::SetPriceCommand, warehouse_approval_command::WarehouseApprovalCommand,
    },
    entities::spare_part_request::{self, SparePartStatus},
    errors::ServiceError,
};

use common::{actor, TestApp};

async fn priced_request(
    app: &TestApp,
    engineer: &AuthenticatedUser,
) -> spare_part_request::Model {
    let parts = app.state.spare_part_service();

    let request = parts
        .create_request(CreateSparePartRequestCommand {
            maintenance_visit_id: Uuid::new_v4(),
            part_description: "CT tube cooling pump".to_string(),
            actor: engineer.clone(),
        })
        .await
        .unwrap();

    parts
        .check_availability(CheckAvailabilityCommand {
            request_id: request.id,
            is_available: true,
            actor: actor(Role::SparePartsCoordinator),
        })
        .await
        .unwrap();

    parts
        .set_price(SetPriceCommand {
            request_id: request.id,
            price: dec!(150.00),
            actor: actor(Role::MaintenanceManager),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn full_chain_reaches_delivered() {
    let app = TestApp::new().await;
    let parts = app.state.spare_part_service();
    let engineer = actor(Role::Engineer);

    let request = priced_request(&app, &engineer).await;
    assert_eq!(request.status, SparePartStatus::Priced);
    assert_eq!(request.price, Some(dec!(150.00)));

    let request = parts
        .customer_decision(CustomerDecisionCommand {
            request_id: request.id,
            approved: true,
            notes: None,
            actor: actor(Role::Customer),
        })
        .await
        .unwrap();
    assert_eq!(request.status, SparePartStatus::CustomerApproved);

    let request = parts
        .warehouse_approval(WarehouseApprovalCommand {
            request_id: request.id,
            approved: true,
            notes: Some("in stock, aisle 9".to_string()),
            actor: actor(Role::WarehouseKeeper),
        })
        .await
        .unwrap();
    assert_eq!(request.status, SparePartStatus::WarehouseApproved);

    let request = parts
        .mark_ready(MarkReadyCommand {
            request_id: request.id,
            actor: actor(Role::InventoryManager),
        })
        .await
        .unwrap();
    assert_eq!(request.status, SparePartStatus::Ready);
    assert!(request.ready_at.is_some());

    let request = parts
        .mark_delivered(MarkDeliveredCommand {
            request_id: request.id,
            actor: engineer.clone(),
        })
        .await
        .unwrap();
    assert_eq!(request.status, SparePartStatus::Delivered);
    assert_eq!(request.delivered_to, Some(engineer.user_id));

    // Terminal: delivery is not replayable.
    let replay = parts
        .mark_delivered(MarkDeliveredCommand {
            request_id: request.id,
            actor: engineer,
        })
        .await;
    assert_matches!(replay, Err(ServiceError::InvalidStateTransition(_)));

    let history = parts.request_history(&request.id).await.unwrap();
    assert_eq!(history.len(), 7);
    assert_eq!(
        history.last().unwrap().status_to,
        SparePartStatus::Delivered.to_string()
    );
}

#[tokio::test]
async fn decision_without_price_fails() {
    let app = TestApp::new().await;
    let parts = app.state.spare_part_service();

    let request = parts
        .create_request(CreateSparePartRequestCommand {
            maintenance_visit_id: Uuid::new_v4(),
            part_description: "flow sensor".to_string(),
            actor: actor(Role::Engineer),
        })
        .await
        .unwrap();

    parts
        .check_availability(CheckAvailabilityCommand {
            request_id: request.id,
            is_available: true,
            actor: actor(Role::SparePartsCoordinator),
        })
        .await
        .unwrap();

    let result = parts
        .customer_decision(CustomerDecisionCommand {
            request_id: request.id,
            approved: true,
            notes: None,
            actor: actor(Role::Customer),
        })
        .await;
    assert_matches!(result, Err(ServiceError::PriceNotSet(_)));
}

#[tokio::test]
async fn customer_rejection_is_terminal() {
    let app = TestApp::new().await;
    let parts = app.state.spare_part_service();
    let engineer = actor(Role::Engineer);

    let request = priced_request(&app, &engineer).await;

    let request = parts
        .customer_decision(CustomerDecisionCommand {
            request_id: request.id,
            approved: false,
            notes: Some("too expensive".to_string()),
            actor: actor(Role::Customer),
        })
        .await
        .unwrap();
    assert_eq!(request.status, SparePartStatus::CustomerRejected);

    let result = parts
        .warehouse_approval(WarehouseApprovalCommand {
            request_id: request.id,
            approved: true,
            notes: None,
            actor: actor(Role::WarehouseKeeper),
        })
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn each_edge_requires_its_role() {
    let app = TestApp::new().await;
    let parts = app.state.spare_part_service();

    let request = parts
        .create_request(CreateSparePartRequestCommand {
            maintenance_visit_id: Uuid::new_v4(),
            part_description: "collimator blade".to_string(),
            actor: actor(Role::Engineer),
        })
        .await
        .unwrap();

    // The coordinator cannot price, the manager cannot check stock.
    let wrong_pricer = parts
        .set_price(SetPriceCommand {
            request_id: request.id,
            price: dec!(80),
            actor: actor(Role::SparePartsCoordinator),
        })
        .await;
    assert_matches!(wrong_pricer, Err(ServiceError::UnauthorizedActor(_)));

    let wrong_checker = parts
        .check_availability(CheckAvailabilityCommand {
            request_id: request.id,
            is_available: true,
            actor: actor(Role::MaintenanceManager),
        })
        .await;
    assert_matches!(wrong_checker, Err(ServiceError::UnauthorizedActor(_)));
}

#[tokio::test]
async fn stages_cannot_be_skipped() {
    let app = TestApp::new().await;
    let parts = app.state.spare_part_service();

    let request = parts
        .create_request(CreateSparePartRequestCommand {
            maintenance_visit_id: Uuid::new_v4(),
            part_description: "gantry belt".to_string(),
            actor: actor(Role::Engineer),
        })
        .await
        .unwrap();

    // Pricing before the availability check violates the order.
    let early_price = parts
        .set_price(SetPriceCommand {
            request_id: request.id,
            price: dec!(200),
            actor: actor(Role::MaintenanceManager),
        })
        .await;
    assert_matches!(early_price, Err(ServiceError::InvalidStateTransition(_)));

    // Availability checks are not replayable either.
    parts
        .check_availability(CheckAvailabilityCommand {
            request_id: request.id,
            is_available: false,
            actor: actor(Role::SparePartsCoordinator),
        })
        .await
        .unwrap();
    let replay = parts
        .check_availability(CheckAvailabilityCommand {
            request_id: request.id,
            is_available: true,
            actor: actor(Role::SparePartsCoordinator),
        })
        .await;
    assert_matches!(replay, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn price_must_be_positive() {
    let app = TestApp::new().await;
    let parts = app.state.spare_part_service();

    let request = parts
        .create_request(CreateSparePartRequestCommand {
            maintenance_visit_id: Uuid::new_v4(),
            part_description: "o-ring kit".to_string(),
            actor: actor(Role::Engineer),
        })
        .await
        .unwrap();
    parts
        .check_availability(CheckAvailabilityCommand {
            request_id: request.id,
            is_available: true,
            actor: actor(Role::SparePartsCoordinator),
        })
        .await
        .unwrap();

    let result = parts
        .set_price(SetPriceCommand {
            request_id: request.id,
            price: dec!(0),
            actor: actor(Role::MaintenanceManager),
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn delivery_is_reserved_for_the_requesting_engineer() {
    let app = TestApp::new().await;
    let parts = app.state.spare_part_service();
    let engineer = actor(Role::Engineer);

    let request = priced_request(&app, &engineer).await;
    parts
        .customer_decision(CustomerDecisionCommand {
            request_id: request.id,
            approved: true,
            notes: None,
            actor: actor(Role::Customer),
        })
        .await
        .unwrap();
    parts
        .warehouse_approval(WarehouseApprovalCommand {
            request_id: request.id,
            approved: true,
            notes: None,
            actor: actor(Role::WarehouseKeeper),
        })
        .await
        .unwrap();
    parts
        .mark_ready(MarkReadyCommand {
            request_id: request.id,
            actor: actor(Role::InventoryManager),
        })
        .await
        .unwrap();

    let other_engineer = actor(Role::Engineer);
    let result = parts
        .mark_delivered(MarkDeliveredCommand {
            request_id: request.id,
            actor: other_engineer,
        })
        .await;
    assert_matches!(result, Err(ServiceError::UnauthorizedActor(_)));
}
