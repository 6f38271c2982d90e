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
    entities::offer_request::{self, Entity as OfferRequest},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Reassigns an offer request to a different sales-support user. The
/// request's status is untouched; only the status progression command moves
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignToSupportCommand {
    pub request_id: Uuid,
    pub support_id: Uuid,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for AssignToSupportCommand {
    type Result = offer_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(
            EntityKind::OfferRequest,
            policy::ASSIGN_TO_SUPPORT,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(
            request_id = %updated.id,
            support_id = %self.support_id,
            "offer request reassigned"
        );
        event_sender
            .send(Event::OfferRequestReassigned {
                request_id: updated.id,
                support_id: self.support_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl AssignToSupportCommand {
    async fn apply(&self, db: &DbPool) -> Result<offer_request::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let request = OfferRequest::find_by_id(self.request_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Offer request {} not found", self.request_id))
            })?;

        let status = request.status.clone();
        let version = request.version;
        let mut active: offer_request::ActiveModel = request.into();
        active.assigned_support_id = Set(self.support_id);
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.request_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::OfferRequest,
            updated.id,
            Some(status.to_string()),
            status.to_string(),
            self.actor.user_id,
            Some(format!("reassigned to support {}", self.support_id)),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
