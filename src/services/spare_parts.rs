use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::spare_parts::{
        check_availability_command::CheckAvailabilityCommand,
        create_spare_part_request_command::CreateSparePartRequestCommand,
        customer_decision_command::CustomerDecisionCommand,
        mark_delivered_command::MarkDeliveredCommand, mark_ready_command::MarkReadyCommand,
        set_price_command::SetPriceCommand, warehouse_approval_command::WarehouseApprovalCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{spare_part_request, status_history},
    errors::ServiceError,
    events::EventSender,
    workflow::EntityKind,
};

/// Service exposing the spare part approval chain.
#[derive(Clone)]
pub struct SparePartService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SparePartService {
    /// Creates a new spare part service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Raises a spare part request
    #[instrument(skip(self))]
    pub async fn create_request(
        &self,
        command: CreateSparePartRequestCommand,
    ) -> Result<spare_part_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the coordinator's availability check
    #[instrument(skip(self))]
    pub async fn check_availability(
        &self,
        command: CheckAvailabilityCommand,
    ) -> Result<spare_part_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the maintenance manager's price
    #[instrument(skip(self))]
    pub async fn set_price(
        &self,
        command: SetPriceCommand,
    ) -> Result<spare_part_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the customer's decision
    #[instrument(skip(self))]
    pub async fn customer_decision(
        &self,
        command: CustomerDecisionCommand,
    ) -> Result<spare_part_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the warehouse keeper's decision
    #[instrument(skip(self))]
    pub async fn warehouse_approval(
        &self,
        command: WarehouseApprovalCommand,
    ) -> Result<spare_part_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Marks the part ready for pickup
    #[instrument(skip(self))]
    pub async fn mark_ready(
        &self,
        command: MarkReadyCommand,
    ) -> Result<spare_part_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Confirms delivery to the requesting engineer
    #[instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        command: MarkDeliveredCommand,
    ) -> Result<spare_part_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Gets a spare part request by ID
    #[instrument(skip(self))]
    pub async fn get_request(
        &self,
        request_id: &Uuid,
    ) -> Result<Option<spare_part_request::Model>, ServiceError> {
        let db = &*self.db_pool;
        spare_part_request::Entity::find_by_id(*request_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists the requests of a maintenance visit, oldest first
    #[instrument(skip(self))]
    pub async fn requests_for_visit(
        &self,
        visit_id: &Uuid,
    ) -> Result<Vec<spare_part_request::Model>, ServiceError> {
        let db = &*self.db_pool;
        spare_part_request::Entity::find()
            .filter(spare_part_request::Column::MaintenanceVisitId.eq(*visit_id))
            .order_by_asc(spare_part_request::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists spare part requests with pagination
    #[instrument(skip(self))]
    pub async fn list_requests(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<spare_part_request::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = spare_part_request::Entity::find()
            .order_by_desc(spare_part_request::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let requests = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((requests, total))
    }

    /// Returns the audit trail of a request, oldest first
    #[instrument(skip(self))]
    pub async fn request_history(
        &self,
        request_id: &Uuid,
    ) -> Result<Vec<status_history::Model>, ServiceError> {
        let db = &*self.db_pool;
        status_history::Entity::find()
            .filter(status_history::Column::EntityType.eq(EntityKind::SparePartRequest.as_str()))
            .filter(status_history::Column::EntityId.eq(*request_id))
            .order_by_asc(status_history::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}
