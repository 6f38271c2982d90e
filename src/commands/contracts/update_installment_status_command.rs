use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{policy, AuthenticatedUser},
    commands::Command,
    db::DbPool,
    entities::contract_installment::{self, Entity as ContractInstallment, InstallmentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Applies the billing collaborator's verdict on one installment row.
/// Paid rows are immutable; the guard rejects any further change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInstallmentStatusCommand {
    pub installment_id: Uuid,
    pub new_status: InstallmentStatus,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for UpdateInstallmentStatusCommand {
    type Result = contract_installment::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(installment_id = %self.installment_id, new_status = %self.new_status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(
            EntityKind::Contract,
            policy::UPDATE_INSTALLMENT_STATUS,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(
            installment_id = %updated.id,
            contract_id = %updated.contract_id,
            new_status = %updated.status,
            "installment status updated"
        );
        event_sender
            .send(Event::ContractInstallmentUpdated {
                contract_id: updated.contract_id,
                installment_id: updated.id,
                new_status: updated.status.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl UpdateInstallmentStatusCommand {
    async fn apply(&self, db: &DbPool) -> Result<contract_installment::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let row = ContractInstallment::find_by_id(self.installment_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Installment {} not found", self.installment_id))
            })?;

        let from = row.status.clone();
        workflow::guard_transition(EntityKind::Contract, row.id, &from, &self.new_status)?;

        let contract_id = row.contract_id;
        let sequence_no = row.sequence_no;
        let now = Utc::now();
        let mut active: contract_installment::ActiveModel = row.into();
        active.status = Set(self.new_status.clone());
        if self.new_status == InstallmentStatus::Paid {
            active.paid_at = Set(Some(now));
        }
        active.updated_at = Set(Some(now));

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.installment_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::Contract,
            contract_id,
            Some(from.to_string()),
            self.new_status.to_string(),
            self.actor.user_id,
            Some(format!("installment {} updated", sequence_no)),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
