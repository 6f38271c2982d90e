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
    entities::deal::{self, DealStatus, Entity as Deal},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Moves a draft deal into the manager approval queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitForApprovalCommand {
    pub deal_id: Uuid,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for SubmitForApprovalCommand {
    type Result = deal::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(deal_id = %self.deal_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(EntityKind::Deal, policy::SUBMIT_FOR_APPROVAL, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(deal_id = %updated.id, "deal submitted for manager approval");
        event_sender
            .send(Event::DealSubmittedForApproval(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl SubmitForApprovalCommand {
    async fn apply(&self, db: &DbPool) -> Result<deal::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let deal = Deal::find_by_id(self.deal_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Deal {} not found", self.deal_id)))?;

        if deal.salesman_id != self.actor.user_id {
            return Err(ServiceError::UnauthorizedActor(format!(
                "user {} is not the salesman of deal {}",
                self.actor.user_id, deal.id
            )));
        }

        let from = deal.status.clone();
        let to = DealStatus::PendingManagerApproval;
        workflow::guard_transition(EntityKind::Deal, deal.id, &from, &to)?;

        let version = deal.version;
        let mut active: deal::ActiveModel = deal.into();
        active.status = Set(to.clone());
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.deal_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::Deal,
            updated.id,
            Some(from.to_string()),
            to.to_string(),
            self.actor.user_id,
            None,
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
