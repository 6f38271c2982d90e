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
    entities::contract::{self, Entity as Contract},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Stores the id of the matching record in the legacy TBS system.
///
/// The id is validated against the read-only lookup collaborator by the
/// service layer before this command runs; the command itself only records
/// the link.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LinkLegacyContractCommand {
    pub contract_id: Uuid,
    #[validate(length(min = 1, max = 64, message = "Legacy contract id must be 1-64 characters"))]
    pub legacy_id: String,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for LinkLegacyContractCommand {
    type Result = contract::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(contract_id = %self.contract_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(
            EntityKind::Contract,
            policy::LINK_LEGACY_CONTRACT,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(
            contract_id = %updated.id,
            legacy_id = %self.legacy_id,
            "legacy contract linked"
        );
        event_sender
            .send(Event::ContractLegacyLinked {
                contract_id: updated.id,
                legacy_id: self.legacy_id.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl LinkLegacyContractCommand {
    async fn apply(&self, db: &DbPool) -> Result<contract::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let contract = Contract::find_by_id(self.contract_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Contract {} not found", self.contract_id))
            })?;

        let status = contract.status.clone();
        let version = contract.version;
        let mut active: contract::ActiveModel = contract.into();
        active.legacy_contract_id = Set(Some(self.legacy_id.clone()));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.contract_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::Contract,
            updated.id,
            Some(status.to_string()),
            status.to_string(),
            self.actor.user_id,
            Some(format!("linked legacy contract {}", self.legacy_id)),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
