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
    entities::deal::{self, DealStatus, Entity as Deal, ReviewProgress},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind},
};

/// Which of the two one-time reviews is being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum ReviewSlot {
    First,
    Second,
}

/// Submits one of the two post-account-creation reviews. Each review is
/// accepted exactly once, from the deal's own salesman, in order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitReviewCommand {
    pub deal_id: Uuid,
    pub slot: ReviewSlot,
    #[validate(length(min = 1, max = 4000, message = "Review text must be 1-4000 characters"))]
    pub text: String,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for SubmitReviewCommand {
    type Result = deal::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(deal_id = %self.deal_id, slot = %self.slot))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let transition = match self.slot {
            ReviewSlot::First => policy::SUBMIT_FIRST_REVIEW,
            ReviewSlot::Second => policy::SUBMIT_SECOND_REVIEW,
        };
        policy::authorize(EntityKind::Deal, transition, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(deal_id = %updated.id, slot = %self.slot, "review submitted");
        event_sender
            .send(Event::DealReviewSubmitted {
                deal_id: updated.id,
                review: self.slot.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl SubmitReviewCommand {
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

        if !deal.account_is_created() {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Deal {} has no client account yet (status {})",
                deal.id, deal.status
            )));
        }

        let from = deal.status.clone();
        let now = Utc::now();
        let version = deal.version;

        match self.slot {
            ReviewSlot::First => {
                match deal.review_progress {
                    ReviewProgress::FirstPending => {}
                    ReviewProgress::SecondPending | ReviewProgress::Completed => {
                        return Err(ServiceError::DuplicateSubmission(format!(
                            "first review for deal {} was already submitted",
                            deal.id
                        )));
                    }
                }

                let to = DealStatus::AwaitingReviews;
                workflow::guard_transition(EntityKind::Deal, deal.id, &from, &to)?;

                let mut active: deal::ActiveModel = deal.into();
                active.status = Set(to.clone());
                active.review_progress = Set(ReviewProgress::SecondPending);
                active.first_review = Set(Some(self.text.clone()));
                active.first_review_at = Set(Some(now));
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
                    Some("first review submitted".to_string()),
                )
                .await?;

                txn.commit().await.map_err(ServiceError::db_error)?;
                Ok(updated)
            }
            ReviewSlot::Second => {
                match deal.review_progress {
                    ReviewProgress::SecondPending => {}
                    ReviewProgress::FirstPending => {
                        return Err(ServiceError::InvalidStateTransition(format!(
                            "first review for deal {} has not been submitted yet",
                            deal.id
                        )));
                    }
                    ReviewProgress::Completed => {
                        return Err(ServiceError::DuplicateSubmission(format!(
                            "second review for deal {} was already submitted",
                            deal.id
                        )));
                    }
                }

                let mut active: deal::ActiveModel = deal.into();
                active.review_progress = Set(ReviewProgress::Completed);
                active.second_review = Set(Some(self.text.clone()));
                active.second_review_at = Set(Some(now));
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
                    from.to_string(),
                    self.actor.user_id,
                    Some("second review submitted".to_string()),
                )
                .await?;

                txn.commit().await.map_err(ServiceError::db_error)?;
                Ok(updated)
            }
        }
    }
}
