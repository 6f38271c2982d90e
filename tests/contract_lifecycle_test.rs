mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use medequip_api::{
    auth::Role,
    commands::contracts::{
        cancel_contract_command::CancelContractCommand,
        draft_contract_command::{DraftContractCommand, ScheduleLine},
        link_legacy_contract_command::LinkLegacyContractCommand,
        send_to_customer_command::SendToCustomerCommand, sign_contract_command::SignContractCommand,
        update_installment_status_command::UpdateInstallmentStatusCommand,
    },
    entities::{contract::ContractStatus, contract_installment::InstallmentStatus},
    errors::ServiceError,
};

use common::{actor, TestApp, KNOWN_LEGACY_ID};

fn cash_contract(number: &str) -> DraftContractCommand {
    DraftContractCommand {
        contract_number: number.to_string(),
        client_id: Uuid::new_v4(),
        deal_id: None,
        terms: Some("standard supply terms".to_string()),
        cash_amount: Some(dec!(48000)),
        installment_amount: None,
        schedule: vec![],
        actor: actor(Role::Admin),
    }
}

#[tokio::test]
async fn exactly_one_amount_must_be_set() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let mut both = cash_contract("C-2024-100");
    both.installment_amount = Some(dec!(50000));
    assert_matches!(
        contracts.draft_contract(both).await,
        Err(ServiceError::ValidationError(_))
    );

    let mut neither = cash_contract("C-2024-101");
    neither.cash_amount = None;
    assert_matches!(
        contracts.draft_contract(neither).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn lifecycle_runs_drafted_sent_signed() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let contract = contracts
        .draft_contract(cash_contract("C-2024-102"))
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::Drafted);

    // Signing before sending skips a stage.
    let early_sign = contracts
        .sign(SignContractCommand {
            contract_id: contract.id,
            signed_by: Uuid::new_v4(),
            signed_at: Utc::now(),
            actor: actor(Role::Admin),
        })
        .await;
    assert_matches!(early_sign, Err(ServiceError::InvalidStateTransition(_)));

    let contract = contracts
        .send_to_customer(SendToCustomerCommand {
            contract_id: contract.id,
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::SentToCustomer);

    // Sending is not replayable.
    let resend = contracts
        .send_to_customer(SendToCustomerCommand {
            contract_id: contract.id,
            actor: actor(Role::Admin),
        })
        .await;
    assert_matches!(resend, Err(ServiceError::InvalidStateTransition(_)));

    let signed_at = Utc::now();
    let contract = contracts
        .sign(SignContractCommand {
            contract_id: contract.id,
            signed_by: Uuid::new_v4(),
            signed_at,
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::Signed);
    assert_eq!(contract.signed_at, Some(signed_at));
}

#[tokio::test]
async fn expiry_is_a_read_time_projection() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let contract = contracts
        .draft_contract(cash_contract("C-2024-103"))
        .await
        .unwrap();
    contracts
        .send_to_customer(SendToCustomerCommand {
            contract_id: contract.id,
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();

    let signed_at = Utc::now();
    contracts
        .sign(SignContractCommand {
            contract_id: contract.id,
            signed_by: Uuid::new_v4(),
            signed_at,
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();

    // Within the window: active, positive days remaining.
    let active = contracts
        .contract_view_at(&contract.id, signed_at + Duration::days(100))
        .await
        .unwrap();
    assert!(!active.is_expired);
    assert!(active.days_until_expiry.unwrap() > 0);
    // The stored status never flips to Expired.
    assert_eq!(active.contract.status, ContractStatus::Signed);

    // One day past the 365-day window: expired, negative days.
    let expired = contracts
        .contract_view_at(&contract.id, signed_at + Duration::days(366))
        .await
        .unwrap();
    assert!(expired.is_expired);
    assert!(expired.days_until_expiry.unwrap() < 0);
    assert_eq!(expired.contract.status, ContractStatus::Signed);
}

#[tokio::test]
async fn cancellation_records_reason_and_is_terminal() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let contract = contracts
        .draft_contract(cash_contract("C-2024-104"))
        .await
        .unwrap();

    let contract = contracts
        .cancel(CancelContractCommand {
            contract_id: contract.id,
            reason: "customer withdrew".to_string(),
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::Cancelled);
    assert_eq!(contract.cancel_reason.as_deref(), Some("customer withdrew"));
    assert!(contract.cancelled_at.is_some());

    let replay = contracts
        .cancel(CancelContractCommand {
            contract_id: contract.id,
            reason: "again".to_string(),
            actor: actor(Role::Admin),
        })
        .await;
    assert_matches!(replay, Err(ServiceError::InvalidStateTransition(_)));
}

#[tokio::test]
async fn installment_schedule_is_aggregated_and_paid_rows_freeze() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let contract = contracts
        .draft_contract(DraftContractCommand {
            contract_number: "C-2024-105".to_string(),
            client_id: Uuid::new_v4(),
            deal_id: None,
            terms: None,
            cash_amount: None,
            installment_amount: Some(dec!(36000)),
            schedule: (0..3)
                .map(|i| ScheduleLine {
                    amount: dec!(12000),
                    due_date: Utc::now() + Duration::days(30 * (i + 1)),
                })
                .collect(),
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();

    let schedule = contracts.contract_installments(&contract.id).await.unwrap();
    assert_eq!(schedule.len(), 3);
    assert!(schedule
        .iter()
        .all(|row| row.status == InstallmentStatus::Pending));

    contracts
        .update_installment_status(UpdateInstallmentStatusCommand {
            installment_id: schedule[0].id,
            new_status: InstallmentStatus::Paid,
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();
    contracts
        .update_installment_status(UpdateInstallmentStatusCommand {
            installment_id: schedule[1].id,
            new_status: InstallmentStatus::Overdue,
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();

    // Paid rows are immutable.
    let frozen = contracts
        .update_installment_status(UpdateInstallmentStatusCommand {
            installment_id: schedule[0].id,
            new_status: InstallmentStatus::Overdue,
            actor: actor(Role::Admin),
        })
        .await;
    assert_matches!(frozen, Err(ServiceError::InvalidStateTransition(_)));

    let view = contracts.contract_view(&contract.id).await.unwrap();
    assert_eq!(view.installments.total, 3);
    assert_eq!(view.installments.paid, 1);
    assert_eq!(view.installments.overdue, 1);
    assert_eq!(view.installments.pending, 1);
}

#[tokio::test]
async fn schedule_requires_an_installment_contract() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let mut command = cash_contract("C-2024-106");
    command.schedule = vec![ScheduleLine {
        amount: dec!(1000),
        due_date: Utc::now(),
    }];
    assert_matches!(
        contracts.draft_contract(command).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn legacy_linkage_validates_against_the_lookup() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let contract = contracts
        .draft_contract(cash_contract("C-2024-107"))
        .await
        .unwrap();

    let unknown = contracts
        .link_legacy_contract(LinkLegacyContractCommand {
            contract_id: contract.id,
            legacy_id: "TBS-0000".to_string(),
            actor: actor(Role::Admin),
        })
        .await;
    assert_matches!(unknown, Err(ServiceError::NotFound(_)));

    let linked = contracts
        .link_legacy_contract(LinkLegacyContractCommand {
            contract_id: contract.id,
            legacy_id: KNOWN_LEGACY_ID.to_string(),
            actor: actor(Role::Admin),
        })
        .await
        .unwrap();
    assert_eq!(linked.legacy_contract_id.as_deref(), Some(KNOWN_LEGACY_ID));
}

#[tokio::test]
async fn manager_role_cannot_draft_contracts() {
    let app = TestApp::new().await;
    let contracts = app.state.contract_service();

    let mut command = cash_contract("C-2024-108");
    command.actor = actor(Role::Manager);
    assert_matches!(
        contracts.draft_contract(command).await,
        Err(ServiceError::UnauthorizedActor(_))
    );
}
