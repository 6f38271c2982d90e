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
    entities::spare_part_request,
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Raises a spare part request for a maintenance visit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSparePartRequestCommand {
    pub maintenance_visit_id: Uuid,
    #[validate(length(min = 1, max = 1024, message = "Part description must be 1-1024 characters"))]
    pub part_description: String,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CreateSparePartRequestCommand {
    type Result = spare_part_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(visit_id = %self.maintenance_visit_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(
            EntityKind::SparePartRequest,
            policy::CREATE_SPARE_PART_REQUEST,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let saved = self.create_request(db).await?;

        info!(request_id = %saved.id, "spare part requested");
        event_sender
            .send(Event::SparePartRequested(saved.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}

impl CreateSparePartRequestCommand {
    async fn create_request(&self, db: &DbPool) -> Result<spare_part_request::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let model = spare_part_request::Model::new(
            self.maintenance_visit_id,
            self.actor.user_id,
            self.part_description.clone(),
        );
        let active: spare_part_request::ActiveModel = model.into();
        let saved = active.insert(&txn).await.map_err(ServiceError::db_error)?;

        workflow::record_transition(
            &txn,
            EntityKind::SparePartRequest,
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
