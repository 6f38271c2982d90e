use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{policy, AuthenticatedUser},
    commands::Command,
    db::DbPool,
    entities::contract::{self, ContractStatus, Entity as Contract},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Cancels a contract from any of Drafted / SentToCustomer / Signed.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelContractCommand {
    pub contract_id: Uuid,
    #[validate(length(min = 1, max = 2000, message = "A cancellation reason is required"))]
    pub reason: String,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CancelContractCommand {
    type Result = contract::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(contract_id = %self.contract_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(EntityKind::Contract, policy::CANCEL_CONTRACT, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(contract_id = %updated.id, "contract cancelled");
        event_sender
            .send(Event::ContractCancelled(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl CancelContractCommand {
    async fn apply(&self, db: &DbPool) -> Result<contract::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let contract = Contract::find_by_id(self.contract_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Contract {} not found", self.contract_id))
            })?;

        let from = contract.status.clone();
        let to = ContractStatus::Cancelled;
        workflow::guard_transition(EntityKind::Contract, contract.id, &from, &to)?;

        let now = Utc::now();
        let version = contract.version;
        let mut active: contract::ActiveModel = contract.into();
        active.status = Set(to.clone());
        active.cancelled_at = Set(Some(now));
        active.cancelled_by = Set(Some(self.actor.user_id));
        active.cancel_reason = Set(Some(self.reason.clone()));
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.contract_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::Contract,
            updated.id,
            Some(from.to_string()),
            to.to_string(),
            self.actor.user_id,
            Some(self.reason.clone()),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
