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
    entities::offer::{self, Entity as Offer, OfferStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Records the assigned salesman's accept/reject decision on a sent offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSalesmanDecisionCommand {
    pub offer_id: Uuid,
    pub accepted: bool,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for RecordSalesmanDecisionCommand {
    type Result = offer::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(offer_id = %self.offer_id, accepted = self.accepted))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(
            EntityKind::Offer,
            policy::RECORD_SALESMAN_DECISION,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(offer_id = %updated.id, accepted = self.accepted, "salesman decision recorded");
        let event = if self.accepted {
            Event::OfferAccepted(updated.id)
        } else {
            Event::OfferRejected(updated.id)
        };
        event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl RecordSalesmanDecisionCommand {
    async fn apply(&self, db: &DbPool) -> Result<offer::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let offer = Offer::find_by_id(self.offer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Offer {} not found", self.offer_id)))?;

        if offer.salesman_id != Some(self.actor.user_id) {
            return Err(ServiceError::UnauthorizedActor(format!(
                "user {} is not the salesman of offer {}",
                self.actor.user_id, offer.id
            )));
        }

        let from = offer.status.clone();
        let to = if self.accepted {
            OfferStatus::Accepted
        } else {
            OfferStatus::Rejected
        };
        workflow::guard_transition(EntityKind::Offer, offer.id, &from, &to)?;

        let now = Utc::now();
        let version = offer.version;
        let mut active: offer::ActiveModel = offer.into();
        active.status = Set(to.clone());
        active.decided_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.offer_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::Offer,
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
