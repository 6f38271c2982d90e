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

/// Submits the salesman's closing report once credentials are in place.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitSalesmanReportCommand {
    pub deal_id: Uuid,
    #[validate(length(min = 1, max = 8000, message = "Report text must be 1-8000 characters"))]
    pub text: String,
    /// References into the attachment store managed outside this crate.
    pub attachments: Vec<String>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for SubmitSalesmanReportCommand {
    type Result = deal::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(deal_id = %self.deal_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(EntityKind::Deal, policy::SUBMIT_SALESMAN_REPORT, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(deal_id = %updated.id, "salesman report submitted");
        event_sender
            .send(Event::DealReportSubmitted(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl SubmitSalesmanReportCommand {
    async fn apply(&self, db: &DbPool) -> Result<deal::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let deal = Deal::find_by_id(self.deal_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Deal {} not found", self.deal_id)))?;

        if deal.salesman_id != self.actor.user_id {
            return Err(ServiceError::UnauthorizedActor(format!(
                "user {} is not the salesman of deal {}",
                self.actor.user_id, deal.id
            )));
        }

        if !deal.credentials_are_set() {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Deal {} has no client credentials yet (status {})",
                deal.id, deal.status
            )));
        }

        let from = deal.status.clone();
        let to = DealStatus::ReportSubmitted;
        workflow::guard_transition(EntityKind::Deal, deal.id, &from, &to)?;

        let attachments = serde_json::to_string(&self.attachments)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let now = Utc::now();
        let version = deal.version;
        let mut active: deal::ActiveModel = deal.into();
        active.status = Set(to.clone());
        active.report_text = Set(Some(self.text.clone()));
        active.report_attachments = Set(Some(attachments));
        active.report_submitted_at = Set(Some(now));
        active.updated_at = Set(Some(now));
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
            None,
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
