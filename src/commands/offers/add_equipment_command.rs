use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
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
        offer_equipment,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::EntityKind,
};

/// Appends a priced equipment line to a draft offer.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddEquipmentCommand {
    pub offer_id: Uuid,
    #[validate(length(min = 1, max = 256, message = "Equipment name must be 1-256 characters"))]
    pub name: String,
    pub image_url: Option<String>,
    pub price: Decimal,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for AddEquipmentCommand {
    type Result = offer_equipment::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(offer_id = %self.offer_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        if self.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Equipment price must be positive".to_string(),
            ));
        }
        policy::authorize(EntityKind::Offer, policy::ADD_EQUIPMENT, &self.actor)?;

        let db = db_pool.as_ref();
        let saved = self.add_equipment(db).await?;

        info!(offer_id = %self.offer_id, equipment_id = %saved.id, "equipment line added");
        event_sender
            .send(Event::OfferEquipmentAdded {
                offer_id: self.offer_id,
                equipment_id: saved.id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(saved)
    }
}

impl AddEquipmentCommand {
    async fn add_equipment(&self, db: &DbPool) -> Result<offer_equipment::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let offer = Offer::find_by_id(self.offer_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Offer {} not found", self.offer_id)))?;

        if !offer.status.is_editable() {
            return Err(ServiceError::OfferNotEditable(offer.id));
        }

        let line = offer_equipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            offer_id: Set(offer.id),
            name: Set(self.name.clone()),
            image_url: Set(self.image_url.clone()),
            price: Set(self.price),
            created_at: Set(Utc::now()),
        };
        let saved = line.insert(&txn).await.map_err(ServiceError::db_error)?;

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
