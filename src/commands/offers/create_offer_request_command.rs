use std::sync::Arc;

use sea_orm::{ActiveModelTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{policy, AuthenticatedUser},
    commands::Command,
    db::DbPool,
    entities::offer_request,
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Raises a new offer request. The support assignee is resolved by the
/// service layer's assignment policy before the command runs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOfferRequestCommand {
    pub client_id: Uuid,
    #[validate(length(max = 4000, message = "Request details are limited to 4000 characters"))]
    pub details: Option<String>,
    pub assigned_support_id: Uuid,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CreateOfferRequestCommand {
    type Result = offer_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(client_id = %self.client_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(
            EntityKind::OfferRequest,
            policy::CREATE_OFFER_REQUEST,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let saved = self.create_request(db).await?;

        info!(
            request_id = %saved.id,
            assigned_support_id = %saved.assigned_support_id,
            "offer request created"
        );
        event_sender
            .send(Event::OfferRequestCreated {
                request_id: saved.id,
                assigned_support_id: saved.assigned_support_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}

impl CreateOfferRequestCommand {
    async fn create_request(&self, db: &DbPool) -> Result<offer_request::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let model = offer_request::Model::new(
            self.client_id,
            self.actor.user_id,
            self.assigned_support_id,
            self.details.clone(),
        );
        let active: offer_request::ActiveModel = model.into();
        let saved = active.insert(&txn).await.map_err(ServiceError::db_error)?;

        workflow::record_transition(
            &txn,
            EntityKind::OfferRequest,
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
