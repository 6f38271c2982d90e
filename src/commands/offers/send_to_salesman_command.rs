use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    auth::{policy, AuthenticatedUser},
    commands::Command,
    db::DbPool,
    entities::{
        offer::{self, Entity as Offer, OfferStatus},
        offer_equipment::{self, Entity as OfferEquipment},
        offer_request::{self, Entity as OfferRequest, OfferRequestStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind, WorkflowStatus},
};

/// Sends a draft offer to its salesman. Requires at least one equipment
/// line; afterwards the offer only accepts status transitions. The target
/// defaults to the linked request's requester when not given explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendToSalesmanCommand {
    pub offer_id: Uuid,
    pub salesman_id: Option<Uuid>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for SendToSalesmanCommand {
    type Result = offer::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(offer_id = %self.offer_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(EntityKind::Offer, policy::SEND_TO_SALESMAN, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        let salesman_id = updated
            .salesman_id
            .ok_or_else(|| ServiceError::InternalError("sent offer lost its salesman".into()))?;
        info!(offer_id = %updated.id, salesman_id = %salesman_id, "offer sent to salesman");
        event_sender
            .send(Event::OfferSentToSalesman {
                offer_id: updated.id,
                salesman_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl SendToSalesmanCommand {
    async fn apply(&self, db: &DbPool) -> Result<offer::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let offer = Offer::find_by_id(self.offer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Offer {} not found", self.offer_id)))?;

        let from = offer.status.clone();
        let to = OfferStatus::SentToSalesman;
        workflow::guard_transition(EntityKind::Offer, offer.id, &from, &to)?;

        let equipment_count = OfferEquipment::find()
            .filter(offer_equipment::Column::OfferId.eq(offer.id))
            .count(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if equipment_count == 0 {
            return Err(ServiceError::ValidationError(format!(
                "Offer {} has no equipment lines",
                offer.id
            )));
        }

        let salesman_id = self
            .salesman_id
            .or(offer.salesman_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Offer {} has no salesman to send to",
                    offer.id
                ))
            })?;

        let request_id = offer.offer_request_id;
        let now = Utc::now();
        let version = offer.version;
        let mut active: offer::ActiveModel = offer.into();
        active.status = Set(to.clone());
        active.salesman_id = Set(Some(salesman_id));
        active.sent_at = Set(Some(now));
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

        // Close out the originating request where the linear machine allows it.
        if let Some(request_id) = request_id {
            if let Some(request) = OfferRequest::find_by_id(request_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
            {
                let request_from = request.status.clone();
                if request_from.can_transition_to(&OfferRequestStatus::Completed) {
                    let request_version = request.version;
                    let mut request: offer_request::ActiveModel = request.into();
                    request.status = Set(OfferRequestStatus::Completed);
                    request.updated_at = Set(Some(now));
                    request.version = Set(request_version + 1);
                    request
                        .update(&txn)
                        .await
                        .map_err(|e| ServiceError::from_write_err(e, request_id))?;

                    workflow::record_transition(
                        &txn,
                        EntityKind::OfferRequest,
                        request_id,
                        Some(request_from.to_string()),
                        OfferRequestStatus::Completed.to_string(),
                        self.actor.user_id,
                        Some(format!("offer {} sent", updated.id)),
                    )
                    .await?;
                } else {
                    debug!(
                        request_id = %request_id,
                        status = %request_from,
                        "linked request not completable from its current status"
                    );
                }
            }
        }

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
