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
    entities::deal::{self, DealStatus, Entity as Deal},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Records the super-admin's decision on a manager-approved deal.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuperAdminApprovalCommand {
    pub deal_id: Uuid,
    pub approved: bool,
    #[validate(length(max = 2000, message = "Approval notes are limited to 2000 characters"))]
    pub notes: Option<String>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for SuperAdminApprovalCommand {
    type Result = deal::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(deal_id = %self.deal_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(EntityKind::Deal, policy::SUPER_ADMIN_APPROVAL, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(deal_id = %updated.id, approved = self.approved, "super-admin decision recorded");
        let event = if self.approved {
            Event::DealSuperAdminApproved(updated.id)
        } else {
            Event::DealSuperAdminRejected(updated.id)
        };
        event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl SuperAdminApprovalCommand {
    async fn apply(&self, db: &DbPool) -> Result<deal::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let deal = Deal::find_by_id(self.deal_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Deal {} not found", self.deal_id)))?;

        // A stage can never be skipped: the super-admin only decides deals
        // that carry a manager approval.
        if !deal.has_manager_approval() || deal.status != DealStatus::PendingSuperAdminApproval {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Deal {} has no pending manager-approved submission (status {})",
                deal.id, deal.status
            )));
        }

        let from = deal.status.clone();
        let to = if self.approved {
            DealStatus::AccountCreationPending
        } else {
            DealStatus::Failed
        };
        workflow::guard_transition(EntityKind::Deal, deal.id, &from, &to)?;

        let version = deal.version;
        let mut active: deal::ActiveModel = deal.into();
        active.status = Set(to.clone());
        active.super_admin_approved = Set(Some(self.approved));
        active.super_admin_approval_notes = Set(self.notes.clone());
        active.super_admin_approved_by = Set(Some(self.actor.user_id));
        active.super_admin_approved_at = Set(Some(Utc::now()));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.deal_id))?;

        workflow::record_transition(
            &txn,
            EntityKind::Deal,
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
