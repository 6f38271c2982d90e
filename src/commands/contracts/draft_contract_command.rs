use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{policy, AuthenticatedUser},
    commands::Command,
    db::DbPool,
    entities::{
        contract,
        contract_installment::{self, InstallmentStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// One row of the contract's payment schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleLine {
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
}

/// Drafts a contract. Exactly one of `cash_amount` / `installment_amount`
/// must be set; a payment schedule may only accompany an installment
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DraftContractCommand {
    #[validate(length(min = 1, max = 64, message = "Contract number must be 1-64 characters"))]
    pub contract_number: String,
    pub client_id: Uuid,
    pub deal_id: Option<Uuid>,
    #[validate(length(max = 16000, message = "Terms are limited to 16000 characters"))]
    pub terms: Option<String>,
    pub cash_amount: Option<Decimal>,
    pub installment_amount: Option<Decimal>,
    pub schedule: Vec<ScheduleLine>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for DraftContractCommand {
    type Result = contract::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(contract_number = %self.contract_number))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        self.validate_amounts()?;
        policy::authorize(EntityKind::Contract, policy::DRAFT_CONTRACT, &self.actor)?;

        let db = db_pool.as_ref();
        let saved = self.create_contract(db).await?;

        info!(contract_id = %saved.id, "contract drafted");
        event_sender
            .send(Event::ContractDrafted(saved.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}

impl DraftContractCommand {
    fn validate_amounts(&self) -> Result<(), ServiceError> {
        match (self.cash_amount, self.installment_amount) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(ServiceError::ValidationError(
                    "Exactly one of cash amount and installment amount must be set".to_string(),
                ));
            }
            (Some(cash), None) if cash <= Decimal::ZERO => {
                return Err(ServiceError::ValidationError(
                    "Cash amount must be positive".to_string(),
                ));
            }
            (None, Some(installment)) if installment <= Decimal::ZERO => {
                return Err(ServiceError::ValidationError(
                    "Installment amount must be positive".to_string(),
                ));
            }
            _ => {}
        }

        if !self.schedule.is_empty() && self.installment_amount.is_none() {
            return Err(ServiceError::ValidationError(
                "A payment schedule requires an installment contract".to_string(),
            ));
        }
        if self.schedule.iter().any(|line| line.amount <= Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Schedule amounts must be positive".to_string(),
            ));
        }

        Ok(())
    }

    async fn create_contract(&self, db: &DbPool) -> Result<contract::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let model = contract::Model::new(
            self.contract_number.clone(),
            self.client_id,
            self.deal_id,
            self.terms.clone(),
            self.cash_amount,
            self.installment_amount,
        );
        let active: contract::ActiveModel = model.into();
        let saved = active.insert(&txn).await.map_err(ServiceError::db_error)?;

        for (index, line) in self.schedule.iter().enumerate() {
            let row = contract_installment::ActiveModel {
                id: Set(Uuid::new_v4()),
                contract_id: Set(saved.id),
                sequence_no: Set(index as i32 + 1),
                amount: Set(line.amount),
                due_date: Set(line.due_date),
                status: Set(InstallmentStatus::Pending),
                paid_at: Set(None),
                created_at: Set(Utc::now()),
                updated_at: Set(None),
            };
            row.insert(&txn).await.map_err(ServiceError::db_error)?;
        }

        workflow::record_transition(
            &txn,
            EntityKind::Contract,
            saved.id,
            None,
            saved.status.to_string(),
            self.actor.user_id,
            None,
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(saved)
    }
}
