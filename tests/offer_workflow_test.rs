mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use medequip_api::{
    auth::{AuthenticatedUser, Role},
    commands::offers::{
        add_equipment_command::AddEquipmentCommand,
        assign_to_support_command::AssignToSupportCommand,
        create_installment_plan_command::{CreateInstallmentPlanCommand, InstallmentLine},
        create_offer_command::CreateOfferCommand,
        record_salesman_decision_command::RecordSalesmanDecisionCommand,
        send_to_salesman_command::SendToSalesmanCommand,
        update_request_status_command::UpdateRequestStatusCommand,
        update_terms_command::UpdateTermsCommand,
    },
    entities::{
        offer::OfferStatus,
        offer_request::{self, OfferRequestStatus},
    },
    errors::ServiceError,
};

use common::{actor, TestApp};

fn support_actor(app: &TestApp, index: usize) -> AuthenticatedUser {
    AuthenticatedUser::with_role(app.support_ids[index], Role::SalesSupport)
}

#[tokio::test]
async fn create_then_fetch_round_trip_yields_pending_with_assignee() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let created = offers
        .create_offer_request(
            Uuid::new_v4(),
            Some("quote for a portable X-ray".to_string()),
            actor(Role::Salesman),
        )
        .await
        .unwrap();

    let fetched = offers
        .get_offer_request(&created.id)
        .await
        .unwrap()
        .expect("request should exist");

    assert_eq!(fetched.status, OfferRequestStatus::Pending);
    assert_eq!(fetched.assigned_support_id, app.support_ids[0]);
}

#[tokio::test]
async fn request_progression_is_linear_and_ownership_gated() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let request = offers
        .create_offer_request(Uuid::new_v4(), None, actor(Role::Salesman))
        .await
        .unwrap();

    // Skipping Assigned is rejected.
    let skip = offers
        .update_request_status(UpdateRequestStatusCommand {
            request_id: request.id,
            new_status: OfferRequestStatus::InProgress,
            notes: None,
            actor: support_actor(&app, 0),
        })
        .await;
    assert_matches!(skip, Err(ServiceError::InvalidStateTransition(_)));

    // A support user who is not the assignee is rejected.
    let unassigned = offers
        .update_request_status(UpdateRequestStatusCommand {
            request_id: request.id,
            new_status: OfferRequestStatus::Assigned,
            notes: None,
            actor: support_actor(&app, 1),
        })
        .await;
    assert_matches!(unassigned, Err(ServiceError::UnauthorizedActor(_)));

    let request = offers
        .update_request_status(UpdateRequestStatusCommand {
            request_id: request.id,
            new_status: OfferRequestStatus::Assigned,
            notes: Some("on it".to_string()),
            actor: support_actor(&app, 0),
        })
        .await
        .unwrap();
    assert_eq!(request.status, OfferRequestStatus::Assigned);

    // A manager may drive any request.
    let request = offers
        .update_request_status(UpdateRequestStatusCommand {
            request_id: request.id,
            new_status: OfferRequestStatus::InProgress,
            notes: None,
            actor: actor(Role::Manager),
        })
        .await
        .unwrap();
    assert_eq!(request.status, OfferRequestStatus::InProgress);
}

#[tokio::test]
async fn reassignment_keeps_status_but_moves_ownership() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let request = offers
        .create_offer_request(Uuid::new_v4(), None, actor(Role::Salesman))
        .await
        .unwrap();
    assert_eq!(request.assigned_support_id, app.support_ids[0]);

    let request = offers
        .assign_to_support(AssignToSupportCommand {
            request_id: request.id,
            support_id: app.support_ids[1],
            actor: actor(Role::Manager),
        })
        .await
        .unwrap();
    assert_eq!(request.assigned_support_id, app.support_ids[1]);
    assert_eq!(request.status, OfferRequestStatus::Pending);

    // The new assignee can now drive the request.
    let request = offers
        .update_request_status(UpdateRequestStatusCommand {
            request_id: request.id,
            new_status: OfferRequestStatus::Assigned,
            notes: None,
            actor: support_actor(&app, 1),
        })
        .await
        .unwrap();
    assert_eq!(request.status, OfferRequestStatus::Assigned);
}

#[tokio::test]
async fn offer_is_frozen_after_sending() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let salesman = actor(Role::Salesman);
    let support = support_actor(&app, 0);

    let request = offers
        .create_offer_request(Uuid::new_v4(), None, salesman.clone())
        .await
        .unwrap();

    let offer = offers
        .create_offer(CreateOfferCommand {
            client_id: request.client_id,
            offer_request_id: Some(request.id),
            actor: support.clone(),
        })
        .await
        .unwrap();
    assert_eq!(offer.status, OfferStatus::Draft);
    assert_eq!(offer.salesman_id, Some(salesman.user_id));

    for (name, price) in [("Ventilator V300", dec!(18500)), ("Patient monitor", dec!(2400))] {
        offers
            .add_equipment(AddEquipmentCommand {
                offer_id: offer.id,
                name: name.to_string(),
                image_url: None,
                price,
                actor: support.clone(),
            })
            .await
            .unwrap();
    }

    offers
        .update_terms(UpdateTermsCommand {
            offer_id: offer.id,
            terms: "Delivery within 45 days, 24-month warranty".to_string(),
            actor: support.clone(),
        })
        .await
        .unwrap();

    offers
        .create_installment_plan(CreateInstallmentPlanCommand {
            offer_id: offer.id,
            lines: vec![
                InstallmentLine {
                    amount: dec!(10450),
                    due_date: chrono::Utc::now(),
                },
                InstallmentLine {
                    amount: dec!(10450),
                    due_date: chrono::Utc::now() + chrono::Duration::days(180),
                },
            ],
            actor: support.clone(),
        })
        .await
        .unwrap();

    let sent = offers
        .send_to_salesman(SendToSalesmanCommand {
            offer_id: offer.id,
            salesman_id: None,
            actor: support.clone(),
        })
        .await
        .unwrap();
    assert_eq!(sent.status, OfferStatus::SentToSalesman);
    assert!(sent.sent_at.is_some());

    // Frozen: no further edits of any kind.
    let late_equipment = offers
        .add_equipment(AddEquipmentCommand {
            offer_id: offer.id,
            name: "Spare probe".to_string(),
            image_url: None,
            price: dec!(300),
            actor: support.clone(),
        })
        .await;
    assert_matches!(late_equipment, Err(ServiceError::OfferNotEditable(_)));

    let late_terms = offers
        .update_terms(UpdateTermsCommand {
            offer_id: offer.id,
            terms: "changed my mind".to_string(),
            actor: support,
        })
        .await;
    assert_matches!(late_terms, Err(ServiceError::OfferNotEditable(_)));

    let equipment = offers.offer_equipment(&offer.id).await.unwrap();
    assert_eq!(equipment.len(), 2);
}

#[tokio::test]
async fn sending_an_empty_offer_is_rejected() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();
    let support = support_actor(&app, 0);

    let offer = offers
        .create_offer(CreateOfferCommand {
            client_id: Uuid::new_v4(),
            offer_request_id: None,
            actor: support.clone(),
        })
        .await
        .unwrap();

    let result = offers
        .send_to_salesman(SendToSalesmanCommand {
            offer_id: offer.id,
            salesman_id: Some(Uuid::new_v4()),
            actor: support,
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn salesman_decision_closes_the_offer() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let salesman = actor(Role::Salesman);
    let support = support_actor(&app, 0);

    let request = offers
        .create_offer_request(Uuid::new_v4(), None, salesman.clone())
        .await
        .unwrap();
    let offer = offers
        .create_offer(CreateOfferCommand {
            client_id: request.client_id,
            offer_request_id: Some(request.id),
            actor: support.clone(),
        })
        .await
        .unwrap();
    offers
        .add_equipment(AddEquipmentCommand {
            offer_id: offer.id,
            name: "Infusion pump".to_string(),
            image_url: Some("images/pump.png".to_string()),
            price: dec!(950),
            actor: support.clone(),
        })
        .await
        .unwrap();
    offers
        .send_to_salesman(SendToSalesmanCommand {
            offer_id: offer.id,
            salesman_id: None,
            actor: support,
        })
        .await
        .unwrap();

    // Only the assigned salesman may decide.
    let stranger = offers
        .record_salesman_decision(RecordSalesmanDecisionCommand {
            offer_id: offer.id,
            accepted: true,
            actor: actor(Role::Salesman),
        })
        .await;
    assert_matches!(stranger, Err(ServiceError::UnauthorizedActor(_)));

    let accepted = offers
        .record_salesman_decision(RecordSalesmanDecisionCommand {
            offer_id: offer.id,
            accepted: true,
            actor: salesman.clone(),
        })
        .await
        .unwrap();
    assert_eq!(accepted.status, OfferStatus::Accepted);

    // Terminal: the decision is not replayable.
    let replay = offers
        .record_salesman_decision(RecordSalesmanDecisionCommand {
            offer_id: offer.id,
            accepted: false,
            actor: salesman,
        })
        .await;
    assert_matches!(replay, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn sending_completes_an_in_progress_request() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let salesman = actor(Role::Salesman);
    let support = support_actor(&app, 0);

    let request = offers
        .create_offer_request(Uuid::new_v4(), None, salesman)
        .await
        .unwrap();
    for status in [OfferRequestStatus::Assigned, OfferRequestStatus::InProgress] {
        offers
            .update_request_status(UpdateRequestStatusCommand {
                request_id: request.id,
                new_status: status,
                notes: None,
                actor: support.clone(),
            })
            .await
            .unwrap();
    }

    let offer = offers
        .create_offer(CreateOfferCommand {
            client_id: request.client_id,
            offer_request_id: Some(request.id),
            actor: support.clone(),
        })
        .await
        .unwrap();
    offers
        .add_equipment(AddEquipmentCommand {
            offer_id: offer.id,
            name: "Defibrillator".to_string(),
            image_url: None,
            price: dec!(5200),
            actor: support.clone(),
        })
        .await
        .unwrap();
    offers
        .send_to_salesman(SendToSalesmanCommand {
            offer_id: offer.id,
            salesman_id: None,
            actor: support,
        })
        .await
        .unwrap();

    let request = offers
        .get_offer_request(&request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.status, OfferRequestStatus::Completed);
    assert_eq!(request.offer_id, Some(offer.id));
}

#[tokio::test]
async fn round_robin_rotates_across_requests() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let first = offers
        .create_offer_request(Uuid::new_v4(), None, actor(Role::Salesman))
        .await
        .unwrap();
    let second = offers
        .create_offer_request(Uuid::new_v4(), None, actor(Role::Salesman))
        .await
        .unwrap();

    assert_eq!(first.assigned_support_id, app.support_ids[0]);
    assert_eq!(second.assigned_support_id, app.support_ids[1]);
}

#[tokio::test]
async fn customer_role_cannot_touch_offer_requests() {
    let app = TestApp::new().await;
    let offers = app.state.offer_service();

    let request: Result<offer_request::Model, _> = offers
        .create_offer_request(Uuid::new_v4(), None, actor(Role::Customer))
        .await;
    assert_matches!(request, Err(ServiceError::UnauthorizedActor(_)));
}
