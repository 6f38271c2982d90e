use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{policy, AuthenticatedUser},
    commands::Command,
    db::DbPool,
    entities::{
        offer::{self, Entity as Offer},
        offer_installment::{self, Entity as OfferInstallment},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::EntityKind,
};

/// One proposed installment line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentLine {
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
}

/// Replaces the installment plan of a draft offer wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateInstallmentPlanCommand {
    pub offer_id: Uuid,
    #[validate(length(min = 1, message = "An installment plan needs at least one line"))]
    pub lines: Vec<InstallmentLine>,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for CreateInstallmentPlanCommand {
    type Result = Vec<offer_installment::Model>;

    #[instrument(skip(self, db_pool, event_sender), fields(offer_id = %self.offer_id, lines = self.lines.len()))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        if self.lines.iter().any(|line| line.amount <= Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Installment amounts must be positive".to_string(),
            ));
        }
        policy::authorize(EntityKind::Offer, policy::CREATE_INSTALLMENT_PLAN, &self.actor)?;

        let db = db_pool.as_ref();
        let saved = self.replace_plan(db).await?;

        info!(offer_id = %self.offer_id, lines = saved.len(), "installment plan replaced");
        event_sender
            .send(Event::OfferInstallmentPlanReplaced {
                offer_id: self.offer_id,
                lines: saved.len(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}

impl CreateInstallmentPlanCommand {
    async fn replace_plan(&self, db: &DbPool) -> Result<Vec<offer_installment::Model>, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let offer = Offer::find_by_id(self.offer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Offer {} not found", self.offer_id)))?;

        if !offer.status.is_editable() {
            return Err(ServiceError::OfferNotEditable(offer.id));
        }

        OfferInstallment::delete_many()
            .filter(offer_installment::Column::OfferId.eq(offer.id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let mut saved = Vec::with_capacity(self.lines.len());
        for (index, line) in self.lines.iter().enumerate() {
            let row = offer_installment::ActiveModel {
                id: Set(Uuid::new_v4()),
                offer_id: Set(offer.id),
                sequence_no: Set(index as i32 + 1),
                amount: Set(line.amount),
                due_date: Set(line.due_date),
                created_at: Set(Utc::now()),
            };
            saved.push(row.insert(&txn).await.map_err(ServiceError::db_error)?);
        }

        let version = offer.version;
        let mut offer: offer::ActiveModel = offer.into();
        offer.updated_at = Set(Some(Utc::now()));
        offer.version = Set(version + 1);
        offer
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_err(e, self.offer_id))?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(saved)
    }
}
