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
    entities::spare_part_request::{self, Entity as SparePartRequest, SparePartStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// The customer's decision on a priced part. Rejection is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerDecisionCommand {
    pub request_id: Uuid,
    pub approved: bool,
    #[validate(length(max = 2000, message = "Decision notes are limited to 2000 characters"))]
    pub notes: Option<String>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CustomerDecisionCommand {
    type Result = spare_part_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id, approved = self.approved))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(
            EntityKind::SparePartRequest,
            policy::CUSTOMER_DECISION,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(request_id = %updated.id, approved = self.approved, "customer decision recorded");
        event_sender
            .send(Event::SparePartCustomerDecision {
                request_id: updated.id,
                approved: self.approved,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl CustomerDecisionCommand {
    async fn apply(&self, db: &DbPool) -> Result<spare_part_request::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let request = SparePartRequest::find_by_id(self.request_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Spare part request {} not found", self.request_id))
            })?;

        // A decision without a recorded price is meaningless.
        if request.price.is_none() {
            return Err(ServiceError::PriceNotSet(request.id));
        }

        let from = request.status.clone();
        let to = if self.approved {
            SparePartStatus::CustomerApproved
        } else {
            SparePartStatus::CustomerRejected
        };
        workflow::guard_transition(EntityKind::SparePartRequest, request.id, &from, &to)?;

        let now = Utc::now();
        let version = request.version;
        let mut active: spare_part_request::ActiveModel = request.into();
        active.status = Set(to.clone());
        active.customer_notes = Set(self.notes.clone());
        active.customer_decided_at = Set(Some(now));
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
            self.notes.clone(),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
