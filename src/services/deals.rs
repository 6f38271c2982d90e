use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::deals::{
        complete_deal_command::CompleteDealCommand, create_deal_command::CreateDealCommand,
        fail_deal_command::FailDealCommand, manager_approval_command::ManagerApprovalCommand,
        mark_account_created_command::MarkAccountCreatedCommand,
        mark_legal_reviewed_command::MarkLegalReviewedCommand,
        set_client_credentials_command::SetClientCredentialsCommand,
        submit_for_approval_command::SubmitForApprovalCommand,
        submit_review_command::SubmitReviewCommand,
        submit_salesman_report_command::SubmitSalesmanReportCommand,
        super_admin_approval_command::SuperAdminApprovalCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{deal, status_history},
    errors::ServiceError,
    events::EventSender,
    workflow::EntityKind,
};

/// Service exposing the deal approval workflow to calling controllers.
#[derive(Clone)]
pub struct DealService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DealService {
    /// Creates a new deal service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new deal in Draft
    #[instrument(skip(self))]
    pub async fn create_deal(&self, command: CreateDealCommand) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Queues a draft deal for manager approval
    #[instrument(skip(self))]
    pub async fn submit_for_approval(
        &self,
        command: SubmitForApprovalCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the manager's approve/reject decision
    #[instrument(skip(self))]
    pub async fn manager_approval(
        &self,
        command: ManagerApprovalCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the super-admin's approve/reject decision
    #[instrument(skip(self))]
    pub async fn super_admin_approval(
        &self,
        command: SuperAdminApprovalCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Marks the client account as provisioned
    #[instrument(skip(self))]
    pub async fn mark_account_created(
        &self,
        command: MarkAccountCreatedCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Submits the first or second one-time review
    #[instrument(skip(self))]
    pub async fn submit_review(
        &self,
        command: SubmitReviewCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the client portal credentials
    #[instrument(skip(self))]
    pub async fn set_client_credentials(
        &self,
        command: SetClientCredentialsCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Submits the salesman's closing report
    #[instrument(skip(self))]
    pub async fn submit_salesman_report(
        &self,
        command: SubmitSalesmanReportCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Closes the deal as completed
    #[instrument(skip(self))]
    pub async fn mark_completed(
        &self,
        command: CompleteDealCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Closes the deal as failed
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, command: FailDealCommand) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Flags a completed deal as legally reviewed
    #[instrument(skip(self))]
    pub async fn mark_legal_reviewed(
        &self,
        command: MarkLegalReviewedCommand,
    ) -> Result<deal::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Gets a deal by ID
    #[instrument(skip(self))]
    pub async fn get_deal(&self, deal_id: &Uuid) -> Result<Option<deal::Model>, ServiceError> {
        let db = &*self.db_pool;
        deal::Entity::find_by_id(*deal_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists deals with pagination
    #[instrument(skip(self))]
    pub async fn list_deals(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<deal::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = deal::Entity::find()
            .order_by_desc(deal::Column::CreatedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let deals = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((deals, total))
    }

    /// Returns the audit trail of a deal, oldest first
    #[instrument(skip(self))]
    pub async fn deal_history(
        &self,
        deal_id: &Uuid,
    ) -> Result<Vec<status_history::Model>, ServiceError> {
        let db = &*self.db_pool;
        status_history::Entity::find()
            .filter(status_history::Column::EntityType.eq(EntityKind::Deal.as_str()))
            .filter(status_history::Column::EntityId.eq(*deal_id))
            .order_by_asc(status_history::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}
