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
    entities::deal,
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDealCommand {
    pub client_id: Uuid,
    #[validate(length(max = 4000, message = "Deal details are limited to 4000 characters"))]
    pub details: Option<String>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CreateDealCommand {
    type Result = deal::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(client_id = %self.client_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(EntityKind::Deal, policy::CREATE_DEAL, &self.actor)?;

        let db = db_pool.as_ref();
        let saved = self.create_deal(db).await?;

        info!(deal_id = %saved.id, salesman_id = %saved.salesman_id, "deal created");
        event_sender
            .send(Event::DealCreated(saved.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}

impl CreateDealCommand {
    async fn create_deal(&self, db: &DbPool) -> Result<deal::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let model = deal::Model::new(self.client_id, self.actor.user_id, self.details.clone());
        let active: deal::ActiveModel = model.into();
        let saved = active.insert(&txn).await.map_err(ServiceError::db_error)?;

        workflow::record_transition(
            &txn,
            EntityKind::Deal,
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
