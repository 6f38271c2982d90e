use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    commands::offers::{
        add_equipment_command::AddEquipmentCommand,
        assign_to_support_command::AssignToSupportCommand,
        create_installment_plan_command::CreateInstallmentPlanCommand,
        create_offer_command::CreateOfferCommand,
        create_offer_request_command::CreateOfferRequestCommand,
        record_salesman_decision_command::RecordSalesmanDecisionCommand,
        send_to_salesman_command::SendToSalesmanCommand,
        update_request_status_command::UpdateRequestStatusCommand,
        update_terms_command::UpdateTermsCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{offer, offer_equipment, offer_installment, offer_request},
    errors::ServiceError,
    events::EventSender,
    services::support_assignment::SupportAssignment,
};

/// Service exposing the offer request and offer workflows.
#[derive(Clone)]
pub struct OfferService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    assignment: Arc<dyn SupportAssignment>,
}

impl OfferService {
    /// Creates a new offer service instance
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        assignment: Arc<dyn SupportAssignment>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            assignment,
        }
    }

    /// Raises an offer request, auto-assigning a support user through the
    /// configured assignment policy.
    #[instrument(skip(self))]
    pub async fn create_offer_request(
        &self,
        client_id: Uuid,
        details: Option<String>,
        actor: AuthenticatedUser,
    ) -> Result<offer_request::Model, ServiceError> {
        let assigned_support_id = self.assignment.next_support().await?;
        let command = CreateOfferRequestCommand {
            client_id,
            details,
            assigned_support_id,
            actor,
        };
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Reassigns a request to a different support user
    #[instrument(skip(self))]
    pub async fn assign_to_support(
        &self,
        command: AssignToSupportCommand,
    ) -> Result<offer_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Advances or rejects a request
    #[instrument(skip(self))]
    pub async fn update_request_status(
        &self,
        command: UpdateRequestStatusCommand,
    ) -> Result<offer_request::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Creates a draft offer
    #[instrument(skip(self))]
    pub async fn create_offer(&self, command: CreateOfferCommand) -> Result<offer::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Appends an equipment line to a draft offer
    #[instrument(skip(self))]
    pub async fn add_equipment(
        &self,
        command: AddEquipmentCommand,
    ) -> Result<offer_equipment::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Creates or replaces the terms of a draft offer
    #[instrument(skip(self))]
    pub async fn update_terms(&self, command: UpdateTermsCommand) -> Result<offer::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Replaces the installment plan of a draft offer
    #[instrument(skip(self))]
    pub async fn create_installment_plan(
        &self,
        command: CreateInstallmentPlanCommand,
    ) -> Result<Vec<offer_installment::Model>, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Sends a draft offer to its salesman
    #[instrument(skip(self))]
    pub async fn send_to_salesman(
        &self,
        command: SendToSalesmanCommand,
    ) -> Result<offer::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the salesman's accept/reject decision
    #[instrument(skip(self))]
    pub async fn record_salesman_decision(
        &self,
        command: RecordSalesmanDecisionCommand,
    ) -> Result<offer::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Gets an offer request by ID
    #[instrument(skip(self))]
    pub async fn get_offer_request(
        &self,
        request_id: &Uuid,
    ) -> Result<Option<offer_request::Model>, ServiceError> {
        let db = &*self.db_pool;
        offer_request::Entity::find_by_id(*request_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Gets an offer by ID
    #[instrument(skip(self))]
    pub async fn get_offer(&self, offer_id: &Uuid) -> Result<Option<offer::Model>, ServiceError> {
        let db = &*self.db_pool;
        offer::Entity::find_by_id(*offer_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists the equipment lines of an offer, oldest first
    #[instrument(skip(self))]
    pub async fn offer_equipment(
        &self,
        offer_id: &Uuid,
    ) -> Result<Vec<offer_equipment::Model>, ServiceError> {
        let db = &*self.db_pool;
        offer_equipment::Entity::find()
            .filter(offer_equipment::Column::OfferId.eq(*offer_id))
            .order_by_asc(offer_equipment::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists the installment plan of an offer in sequence order
    #[instrument(skip(self))]
    pub async fn offer_installments(
        &self,
        offer_id: &Uuid,
    ) -> Result<Vec<offer_installment::Model>, ServiceError> {
        let db = &*self.db_pool;
        offer_installment::Entity::find()
            .filter(offer_installment::Column::OfferId.eq(*offer_id))
            .order_by_asc(offer_installment::Column::SequenceNo)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists offer requests with pagination
    #[instrument(skip(self))]
    pub async fn list_offer_requests(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<offer_request::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = offer_request::Entity::find()
            .order_by_desc(offer_request::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let requests = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((requests, total))
    }
}
