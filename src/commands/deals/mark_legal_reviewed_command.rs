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

/// Flags a completed deal as legally reviewed (soft archival). Recorded at
/// most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkLegalReviewedCommand {
    pub deal_id: Uuid,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for MarkLegalReviewedCommand {
    type Result = deal::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(deal_id = %self.deal_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(EntityKind::Deal, policy::MARK_LEGAL_REVIEWED, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(deal_id = %updated.id, "legal review recorded");
        event_sender
            .send(Event::DealLegalReviewed(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl MarkLegalReviewedCommand {
    async fn apply(&self, db: &DbPool) -> Result<deal::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let deal = Deal::find_by_id(self.deal_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Deal {} not found", self.deal_id)))?;

        if deal.status != DealStatus::Completed {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Deal {} is not completed (status {})",
                deal.id, deal.status
            )));
        }

        if deal.legal_reviewed {
            return Err(ServiceError::DuplicateSubmission(format!(
                "deal {} was already legally reviewed",
                deal.id
            )));
        }

        let status = deal.status.clone();
        let now = Utc::now();
        let version = deal.version;
        let mut active: deal::ActiveModel = deal.into();
        active.legal_reviewed = Set(true);
        active.legal_reviewed_by = Set(Some(self.actor.user_id));
        active.legal_reviewed_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.deal_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::Deal,
            updated.id,
            Some(status.to_string()),
            status.to_string(),
            self.actor.user_id,
            Some("legal review recorded".to_string()),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
