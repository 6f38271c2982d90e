use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
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

/// The maintenance manager's price on an availability-checked part. A
/// price must be recorded before the customer can decide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPriceCommand {
    pub request_id: Uuid,
    pub price: Decimal,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for SetPriceCommand {
    type Result = spare_part_request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if self.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Spare part price must be positive".to_string(),
            ));
        }
        policy::authorize(EntityKind::SparePartRequest, policy::SET_PRICE, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(request_id = %updated.id, price = %self.price, "spare part priced");
        event_sender
            .send(Event::SparePartPriced(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl SetPriceCommand {
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
        let to = SparePartStatus::Priced;
        workflow::guard_transition(EntityKind::SparePartRequest, request.id, &from, &to)?;

        let now = Utc::now();
        let version = request.version;
        let mut active: spare_part_request::ActiveModel = request.into();
        active.status = Set(to.clone());
        active.price = Set(Some(self.price));
        active.priced_by = Set(Some(self.actor.user_id));
        active.priced_at = Set(Some(now));
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
