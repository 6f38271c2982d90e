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
    entities::spare_part_request::{self, Entity as SparePartRequest, SparePartStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// The inventory manager marks a warehouse-approved part ready for pickup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadyCommand {
    pub request_id: Uuid,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for MarkReadyCommand {
    type Result = spare_part_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(EntityKind::SparePartRequest, policy::MARK_READY, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(request_id = %updated.id, "spare part ready for pickup");
        event_sender
            .send(Event::SparePartReady(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl MarkReadyCommand {
    async fn apply(&self, db: &DbPool) -> Result<spare_part_request::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let request = SparePartRequest::find_by_id(self.request_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Spare part request {} not found", self.request_id))
            })?;

        let from = request.status.clone();
        let to = SparePartStatus::Ready;
        workflow::guard_transition(EntityKind::SparePartRequest, request.id, &from, &to)?;

        let now = Utc::now();
        let version = request.version;
        let mut active: spare_part_request::ActiveModel = request.into();
        active.status = Set(to.clone());
        active.ready_by = Set(Some(self.actor.user_id));
        active.ready_at = Set(Some(now));
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.request_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::SparePartRequest,
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
