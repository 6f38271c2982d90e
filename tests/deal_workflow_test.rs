mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use medequip_api::{
    auth::Role,
    commands::deals::{
        complete_deal_command::CompleteDealCommand, create_deal_command::CreateDealCommand,
        fail_deal_command::FailDealCommand, manager_approval_command::ManagerApprovalCommand,
        mark_account_created_command::MarkAccountCreatedCommand,
        mark_legal_reviewed_command::MarkLegalReviewedCommand,
        set_client_credentials_command::SetClientCredentialsCommand,
        submit_review_command::{ReviewSlot, SubmitReviewCommand},
        submit_salesman_report_command::SubmitSalesmanReportCommand,
        super_admin_approval_command::SuperAdminApprovalCommand,
    },
    entities::deal::{self, DealStatus, ReviewProgress},
    errors::ServiceError,
};

use common::{actor, TestApp};

async fn approved_deal_with_account(app: &TestApp) -> (deal::Model, medequip_api::auth::AuthenticatedUser) {
    let deals = app.state.deal_service();
    let salesman = actor(Role::Salesman);

    let deal = deals
        .create_deal(CreateDealCommand {
            client_id: Uuid::new_v4(),
            details: Some("two ultrasound units".to_string()),
            actor: salesman.clone(),
        })
        .await
        .expect("create deal");

    let deal = deals
        .manager_approval(ManagerApprovalCommand {
            deal_id: deal.id,
            approved: true,
            notes: Some("margins check out".to_string()),
            actor: actor(Role::Manager),
        })
        .await
        .expect("manager approval");
    assert_eq!(deal.status, DealStatus::PendingSuperAdminApproval);

    let deal = deals
        .super_admin_approval(SuperAdminApprovalCommand {
            deal_id: deal.id,
            approved: true,
            notes: None,
            actor: actor(Role::SuperAdmin),
        })
        .await
        .expect("super admin approval");
    assert_eq!(deal.status, DealStatus::AccountCreationPending);

    let deal = deals
        .mark_account_created(MarkAccountCreatedCommand {
            deal_id: deal.id,
            actor: actor(Role::Admin),
        })
        .await
        .expect("mark account created");
    assert_eq!(deal.status, DealStatus::AccountCreated);

    (deal, salesman)
}

#[tokio::test]
async fn happy_path_reaches_account_created_and_guards_review_ownership() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();

    let (deal, salesman) = approved_deal_with_account(&app).await;

    // A different salesman cannot file the deal's reviews.
    let stranger = actor(Role::Salesman);
    let result = deals
        .submit_review(SubmitReviewCommand {
            deal_id: deal.id,
            slot: ReviewSlot::First,
            text: "looks great".to_string(),
            actor: stranger,
        })
        .await;
    assert_matches!(result, Err(ServiceError::UnauthorizedActor(_)));

    // The owning salesman can.
    let deal = deals
        .submit_review(SubmitReviewCommand {
            deal_id: deal.id,
            slot: ReviewSlot::First,
            text: "installation went smoothly".to_string(),
            actor: salesman.clone(),
        })
        .await
        .expect("first review");
    assert_eq!(deal.status, DealStatus::AwaitingReviews);
    assert_eq!(deal.review_progress, ReviewProgress::SecondPending);
}

#[tokio::test]
async fn super_admin_cannot_skip_manager_approval() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();

    let deal = deals
        .create_deal(CreateDealCommand {
            client_id: Uuid::new_v4(),
            details: None,
            actor: actor(Role::Salesman),
        })
        .await
        .unwrap();

    let result = deals
        .super_admin_approval(SuperAdminApprovalCommand {
            deal_id: deal.id,
            approved: true,
            notes: None,
            actor: actor(Role::SuperAdmin),
        })
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn manager_approval_is_not_replayable() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();

    let deal = deals
        .create_deal(CreateDealCommand {
            client_id: Uuid::new_v4(),
            details: None,
            actor: actor(Role::Salesman),
        })
        .await
        .unwrap();

    let command = ManagerApprovalCommand {
        deal_id: deal.id,
        approved: true,
        notes: None,
        actor: actor(Role::Manager),
    };
    deals.manager_approval(command).await.unwrap();

    let replay = deals
        .manager_approval(ManagerApprovalCommand {
            deal_id: deal.id,
            approved: true,
            notes: None,
            actor: actor(Role::Manager),
        })
        .await;
    assert_matches!(replay, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn manager_rejection_fails_the_deal() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();

    let deal = deals
        .create_deal(CreateDealCommand {
            client_id: Uuid::new_v4(),
            details: None,
            actor: actor(Role::Salesman),
        })
        .await
        .unwrap();

    let deal = deals
        .manager_approval(ManagerApprovalCommand {
            deal_id: deal.id,
            approved: false,
            notes: Some("pricing under cost".to_string()),
            actor: actor(Role::Manager),
        })
        .await
        .unwrap();
    assert_eq!(deal.status, DealStatus::Failed);

    let result = deals
        .super_admin_approval(SuperAdminApprovalCommand {
            deal_id: deal.id,
            approved: true,
            notes: None,
            actor: actor(Role::SuperAdmin),
        })
        .await;
    assert_matches!(result, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn salesman_cannot_act_as_manager() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();

    let salesman = actor(Role::Salesman);
    let deal = deals
        .create_deal(CreateDealCommand {
            client_id: Uuid::new_v4(),
            details: None,
            actor: salesman.clone(),
        })
        .await
        .unwrap();

    let result = deals
        .manager_approval(ManagerApprovalCommand {
            deal_id: deal.id,
            approved: true,
            notes: None,
            actor: salesman,
        })
        .await;
    assert_matches!(result, Err(ServiceError::UnauthorizedActor(_)));
}

#[tokio::test]
async fn reviews_are_one_time_and_ordered() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();
    let (deal, salesman) = approved_deal_with_account(&app).await;

    // Second review before the first is out of order.
    let early = deals
        .submit_review(SubmitReviewCommand {
            deal_id: deal.id,
            slot: ReviewSlot::Second,
            text: "follow-up".to_string(),
            actor: salesman.clone(),
        })
        .await;
    assert_matches!(early, Err(ServiceError::InvalidStateTransition(_)));

    deals
        .submit_review(SubmitReviewCommand {
            deal_id: deal.id,
            slot: ReviewSlot::First,
            text: "first impressions".to_string(),
            actor: salesman.clone(),
        })
        .await
        .unwrap();

    let duplicate = deals
        .submit_review(SubmitReviewCommand {
            deal_id: deal.id,
            slot: ReviewSlot::First,
            text: "first impressions again".to_string(),
            actor: salesman.clone(),
        })
        .await;
    assert_matches!(duplicate, Err(ServiceError::DuplicateSubmission(_)));

    let deal = deals
        .submit_review(SubmitReviewCommand {
            deal_id: deal.id,
            slot: ReviewSlot::Second,
            text: "follow-up after a month".to_string(),
            actor: salesman.clone(),
        })
        .await
        .unwrap();
    assert_eq!(deal.review_progress, ReviewProgress::Completed);

    let duplicate = deals
        .submit_review(SubmitReviewCommand {
            deal_id: deal.id,
            slot: ReviewSlot::Second,
            text: "yet another".to_string(),
            actor: salesman,
        })
        .await;
    assert_matches!(duplicate, Err(ServiceError::DuplicateSubmission(_)));
}

#[tokio::test]
async fn report_requires_credentials_then_deal_completes() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();
    let (deal, salesman) = approved_deal_with_account(&app).await;

    // No credentials recorded yet.
    let premature = deals
        .submit_salesman_report(SubmitSalesmanReportCommand {
            deal_id: deal.id,
            text: "handover complete".to_string(),
            attachments: vec![],
            actor: salesman.clone(),
        })
        .await;
    assert_matches!(premature, Err(ServiceError::InvalidStateTransition(_)));

    deals
        .set_client_credentials(SetClientCredentialsCommand {
            deal_id: deal.id,
            username: "delta.medical".to_string(),
            password: "$argon2id$placeholder-hash".to_string(),
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();

    let deal = deals
        .submit_salesman_report(SubmitSalesmanReportCommand {
            deal_id: deal.id,
            text: "handover complete, client trained".to_string(),
            attachments: vec!["reports/handover.pdf".to_string()],
            actor: salesman,
        })
        .await
        .unwrap();
    assert_eq!(deal.status, DealStatus::ReportSubmitted);
    assert!(deal.report_submitted_at.is_some());

    let deal = deals
        .mark_completed(CompleteDealCommand {
            deal_id: deal.id,
            notes: Some("invoiced".to_string()),
            actor: actor(Role::Manager),
        })
        .await
        .unwrap();
    assert_eq!(deal.status, DealStatus::Completed);

    // Terminal: completing or failing again is rejected.
    let replay = deals
        .mark_failed(FailDealCommand {
            deal_id: deal.id,
            notes: None,
            actor: actor(Role::Manager),
        })
        .await;
    assert_matches!(replay, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn legal_review_is_recorded_once_on_completed_deals() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();
    let (deal, _salesman) = approved_deal_with_account(&app).await;

    // Not completed yet.
    let premature = deals
        .mark_legal_reviewed(MarkLegalReviewedCommand {
            deal_id: deal.id,
            actor: actor(Role::Admin),
        })
        .await;
    assert_matches!(premature, Err(ServiceError::InvalidStateTransition(_)));

    deals
        .mark_completed(CompleteDealCommand {
            deal_id: deal.id,
            notes: None,
            actor: actor(Role::Manager),
        })
        .await
        .unwrap();

    let deal = deals
        .mark_legal_reviewed(MarkLegalReviewedCommand {
            deal_id: deal.id,
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();
    assert!(deal.legal_reviewed);

    let duplicate = deals
        .mark_legal_reviewed(MarkLegalReviewedCommand {
            deal_id: deal.id,
            actor: actor(Role::Admin),
        })
        .await;
    assert_matches!(duplicate, Err(ServiceError::DuplicateSubmission(_)));
}

#[tokio::test]
async fn every_transition_leaves_an_audit_row() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();
    let (deal, _salesman) = approved_deal_with_account(&app).await;

    let history = deals.deal_history(&deal.id).await.unwrap();
    // create + manager approval + super admin approval + account created
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].status_from, None);
    assert_eq!(history[0].status_to, DealStatus::Draft.to_string());
    assert_eq!(
        history.last().unwrap().status_to,
        DealStatus::AccountCreated.to_string()
    );
}

#[tokio::test]
async fn missing_deal_is_not_found() {
    let app = TestApp::new().await;
    let deals = app.state.deal_service();

    let result = deals
        .manager_approval(ManagerApprovalCommand {
            deal_id: Uuid::new_v4(),
            approved: true,
            notes: None,
            actor: actor(Role::Manager),
        })
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}
