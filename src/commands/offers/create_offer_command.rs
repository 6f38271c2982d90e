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
    entities::{
        offer,
        offer_request::{self, Entity as OfferRequest},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Creates a draft offer, optionally tied to an offer request. A linked
/// request contributes its requester as the offer's salesman target and is
/// back-linked to the new offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOfferCommand {
    pub client_id: Uuid,
    pub offer_request_id: Option<Uuid>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CreateOfferCommand {
    type Result = offer::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(client_id = %self.client_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(EntityKind::Offer, policy::CREATE_OFFER, &self.actor)?;

        let db = db_pool.as_ref();
        let saved = self.create_offer(db).await?;

        info!(offer_id = %saved.id, "offer created");
        event_sender
            .send(Event::OfferCreated(saved.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}

impl CreateOfferCommand {
    async fn create_offer(&self, db: &DbPool) -> Result<offer::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let salesman_id = match self.offer_request_id {
            Some(request_id) => {
                let request = OfferRequest::find_by_id(request_id)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Offer request {} not found", request_id))
                    })?;
                Some(request.requester_id)
            }
            None => None,
        };

        let model = offer::Model::new(
            self.client_id,
            self.actor.user_id,
            self.offer_request_id,
            salesman_id,
        );
        let active: offer::ActiveModel = model.into();
        let saved = active.insert(&txn).await.map_err(ServiceError::db_error)?;

        // Back-link the request to the offer it produced.
        if let Some(request_id) = self.offer_request_id {
            let request = OfferRequest::find_by_id(request_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Offer request {} not found", request_id))
                })?;
            let version = request.version;
            let mut request: offer_request::ActiveModel = request.into();
            request.offer_id = Set(Some(saved.id));
            request.updated_at = Set(Some(Utc::now()));
            request.version = Set(version + 1);
            request
                .update(&txn)
                .await
                .map_err(|e| ServiceError::from_write_err(e, request_id))?;
        }

        workflow::record_transition(
            &txn,
            EntityKind::Offer,
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
