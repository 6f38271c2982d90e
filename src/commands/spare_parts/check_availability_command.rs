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

/// The coordinator's stock check on a freshly requested part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAvailabilityCommand {
    pub request_id: Uuid,
    pub is_available: bool,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CheckAvailabilityCommand {
    type Result = spare_part_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        policy::authorize(
            EntityKind::SparePartRequest,
            policy::CHECK_AVAILABILITY,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(
            request_id = %updated.id,
            is_available = self.is_available,
            "availability checked"
        );
        event_sender
            .send(Event::SparePartAvailabilityChecked {
                request_id: updated.id,
                is_available: self.is_available,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl CheckAvailabilityCommand {
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
        let to = SparePartStatus::AvailabilityChecked;
        workflow::guard_transition(EntityKind::SparePartRequest, request.id, &from, &to)?;

        let now = Utc::now();
        let version = request.version;
        let mut active: spare_part_request::ActiveModel = request.into();
        active.status = Set(to.clone());
        active.is_available = Set(Some(self.is_available));
        active.availability_checked_by = Set(Some(self.actor.user_id));
        active.availability_checked_at = Set(Some(now));
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
