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
    entities::deal::{self, Entity as Deal},
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::{self, EntityKind, WorkflowStatus},
};

/// Records the client portal credentials for a deal whose account exists.
/// The password arrives already hashed by the identity provider; this core
/// stores it opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetClientCredentialsCommand {
    pub deal_id: Uuid,
    #[validate(length(min = 3, max = 128, message = "Username must be 3-128 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password hash is too short"))]
    pub password: String,
    pub actor: AuthenticatedUser,
}

#[async_trait::async_trait]
impl Command for SetClientCredentialsCommand {
    type Result = deal::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(deal_id = %self.deal_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        policy::authorize(EntityKind::Deal, policy::SET_CLIENT_CREDENTIALS, &self.actor)?;

        let db = db_pool.as_ref();
        let updated = self.apply(db).await?;

        info!(deal_id = %updated.id, "client credentials recorded");
        event_sender
            .send(Event::DealCredentialsSet(updated.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}

impl SetClientCredentialsCommand {
    async fn apply(&self, db: &DbPool) -> Result<deal::Model, ServiceError> {
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let deal = Deal::find_by_id(self.deal_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Deal {} not found", self.deal_id)))?;

        if !deal.account_is_created() || deal.status.is_terminal() {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Deal {} cannot take credentials (status {})",
                deal.id, deal.status
            )));
        }

        let status = deal.status.clone();
        let now = Utc::now();
        let version = deal.version;
        let mut active: deal::ActiveModel = deal.into();
        active.client_username = Set(Some(self.username.clone()));
        active.client_password = Set(Some(self.password.clone()));
        active.credentials_set_at = Set(Some(now));
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
            Some(status.to_string()),
            status.to_string(),
            self.actor.user_id,
            Some("client credentials set".to_string()),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }
}
