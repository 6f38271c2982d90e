use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{policy, AuthenticatedUser, Role},
    commands::Command,
    db::DbPool,
    entities::offer_request::{self, Entity as OfferRequest, OfferRequestStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Advances an offer request along its linear progression, or rejects it.
/// Sales-support actors may only move requests assigned to them; managers
/// and super-admins may move any request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateRequestStatusCommand {
    pub request_id: Uuid,
    pub new_status: OfferRequestStatus,
    #[validate(length(max = 2000, message = "Notes are limited to 2000 characters"))]
    pub notes: Option<String>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for UpdateRequestStatusCommand {
    type Result = offer_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id, new_status = %self.new_status))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(
            EntityKind::OfferRequest,
            policy::UPDATE_REQUEST_STATUS,
            &self.actor,
        )?;

        let db = db_pool.as_ref();
        let (old_status, updated) = self.apply(db).await?;

        info!(
            request_id = %updated.id,
            old_status = %old_status,
            new_status = %updated.status,
            "offer request status updated"
        );
        event_sender
            .send(Event::OfferRequestStatusChanged {
                request_id: updated.id,
                old_status: old_status.to_string(),
                new_status: updated.status.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl UpdateRequestStatusCommand {
    async fn apply(
        &self,
        db: &DbPool,
    ) -> Result<(OfferRequestStatus, offer_request::Model), ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let request = OfferRequest::find_by_id(self.request_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Offer request {} not found", self.request_id))
            })?;

        // Support actors may only move their own requests; elevated roles
        // are exempt from the ownership rule.
        let elevated = self
            .actor
            .has_any_role(&[Role::Manager, Role::SuperAdmin]);
        if !elevated && request.assigned_support_id != self.actor.user_id {
            return Err(ServiceError::UnauthorizedActor(format!(
                "user {} is not assigned to offer request {}",
                self.actor.user_id, request.id
            )));
        }

        let from = request.status.clone();
        workflow::guard_transition(EntityKind::OfferRequest, request.id, &from, &self.new_status)?;

        let version = request.version;
        let mut active: offer_request::ActiveModel = request.into();
        active.status = Set(self.new_status.clone());
        if self.notes.is_some() {
            active.notes = Set(self.notes.clone());
        }
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
            Some(from.to_string()),
            self.new_status.to_string(),
            self.actor.user_id,
            self.notes.clone(),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok((from, updated))
    }
}
