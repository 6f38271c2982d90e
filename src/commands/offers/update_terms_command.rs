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
    entities::offer::{self, Entity as Offer},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::EntityKind,
};

/// Creates or replaces the terms text on a draft offer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTermsCommand {
    pub offer_id: Uuid,
    #[validate(length(min = 1, max = 8000, message = "Terms must be 1-8000 characters"))]
    pub terms: String,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for UpdateTermsCommand {
    type Result = offer::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(offer_id = %self.offer_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(EntityKind::Offer, policy::UPDATE_TERMS, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(offer_id = %updated.id, "offer terms updated");
        event_sender
            .send(Event::OfferTermsUpdated(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl UpdateTermsCommand {
    async fn apply(&self, db: &DbPool) -> Result<offer::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let offer = Offer::find_by_id(self.offer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Offer {} not found", self.offer_id)))?;

        if !offer.status.is_editable() {
            return Err(ServiceError::OfferNotEditable(offer.id));
        }

        let version = offer.version;
        let mut active: offer::ActiveModel = offer.into();
        active.terms = Set(Some(self.terms.clone()));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.offer_id))?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
