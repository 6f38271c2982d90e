use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    commands::contracts::{
        cancel_contract_command::CancelContractCommand,
        draft_contract_command::DraftContractCommand,
        link_legacy_contract_command::LinkLegacyContractCommand,
        send_to_customer_command::SendToCustomerCommand, sign_contract_command::SignContractCommand,
        update_installment_status_command::UpdateInstallmentStatusCommand,
    },
    commands::Command,
    db::DbPool,
    entities::{
        contract::{self, ContractStatus},
        contract_installment::{self, InstallmentStatus},
    },
    errors::ServiceError,
    events::EventSender,
    services::legacy::LegacyContractLookup,
};

/// Aggregated installment counts for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstallmentSummary {
    pub total: u64,
    pub paid: u64,
    pub overdue: u64,
    pub pending: u64,
}

/// Read-time projection of a contract.
///
/// Expiry is derived here and never written back: a signed contract is
/// expired once its signature date falls outside the validity window.
#[derive(Debug, Clone, Serialize)]
pub struct ContractView {
    pub contract: contract::Model,
    pub is_expired: bool,
    /// Days until (negative: since) the end of the validity window,
    /// measured from the signature or cancellation date.
    pub days_until_expiry: Option<i64>,
    pub installments: InstallmentSummary,
}

/// Computes the read-time projection for a contract.
pub fn project_contract(
    contract: contract::Model,
    installments: &[contract_installment::Model],
    validity_days: i64,
    now: DateTime<Utc>,
) -> ContractView {
    let validity = Duration::days(validity_days);

    let is_expired = contract.status == ContractStatus::Expired
        || (contract.status == ContractStatus::Signed
            && contract
                .signed_at
                .map(|signed_at| now - signed_at > validity)
                .unwrap_or(false));

    let days_until_expiry = contract
        .signed_at
        .or(contract.cancelled_at)
        .map(|anchor| (anchor + validity - now).num_days());

    let mut summary = InstallmentSummary {
        total: installments.len() as u64,
        ..Default::default()
    };
    for row in installments {
        match row.status {
            InstallmentStatus::Paid => summary.paid += 1,
            InstallmentStatus::Overdue => summary.overdue += 1,
            InstallmentStatus::Pending => summary.pending += 1,
        }
    }

    ContractView {
        contract,
        is_expired,
        days_until_expiry,
        installments: summary,
    }
}

/// Service exposing the contract lifecycle.
#[derive(Clone)]
pub struct ContractService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    validity_days: i64,
    legacy: Arc<dyn LegacyContractLookup>,
}

impl ContractService {
    /// Creates a new contract service instance
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        validity_days: i64,
        legacy: Arc<dyn LegacyContractLookup>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            validity_days,
            legacy,
        }
    }

    /// Drafts a new contract
    #[instrument(skip(self))]
    pub async fn draft_contract(
        &self,
        command: DraftContractCommand,
    ) -> Result<contract::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Sends a drafted contract to the customer
    #[instrument(skip(self))]
    pub async fn send_to_customer(
        &self,
        command: SendToCustomerCommand,
    ) -> Result<contract::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Records the customer signature
    #[instrument(skip(self))]
    pub async fn sign(&self, command: SignContractCommand) -> Result<contract::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Cancels a contract
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        command: CancelContractCommand,
    ) -> Result<contract::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Links a contract to its legacy TBS record after validating the id
    /// against the lookup collaborator.
    #[instrument(skip(self))]
    pub async fn link_legacy_contract(
        &self,
        command: LinkLegacyContractCommand,
    ) -> Result<contract::Model, ServiceError> {
        let record = self.legacy.find(&command.legacy_id).await?;
        if record.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Legacy contract {} not found",
                command.legacy_id
            )));
        }
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Applies the billing collaborator's installment status change
    #[instrument(skip(self))]
    pub async fn update_installment_status(
        &self,
        command: UpdateInstallmentStatusCommand,
    ) -> Result<contract_installment::Model, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Gets a contract by ID
    #[instrument(skip(self))]
    pub async fn get_contract(
        &self,
        contract_id: &Uuid,
    ) -> Result<Option<contract::Model>, ServiceError> {
        let db = &*self.db_pool;
        contract::Entity::find_by_id(*contract_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Returns the contract projection evaluated at the given instant
    #[instrument(skip(self))]
    pub async fn contract_view_at(
        &self,
        contract_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<ContractView, ServiceError> {
        let db = &*self.db_pool;

        let contract = contract::Entity::find_by_id(*contract_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Contract {} not found", contract_id))
            })?;

        let installments = contract_installment::Entity::find()
            .filter(contract_installment::Column::ContractId.eq(*contract_id))
            .order_by_asc(contract_installment::Column::SequenceNo)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(project_contract(
            contract,
            &installments,
            self.validity_days,
            now,
        ))
    }

    /// Returns the contract projection as of now
    #[instrument(skip(self))]
    pub async fn contract_view(&self, contract_id: &Uuid) -> Result<ContractView, ServiceError> {
        self.contract_view_at(contract_id, Utc::now()).await
    }

    /// Lists the installment schedule of a contract in sequence order
    #[instrument(skip(self))]
    pub async fn contract_installments(
        &self,
        contract_id: &Uuid,
    ) -> Result<Vec<contract_installment::Model>, ServiceError> {
        let db = &*self.db_pool;
        contract_installment::Entity::find()
            .filter(contract_installment::Column::ContractId.eq(*contract_id))
            .order_by_asc(contract_installment::Column::SequenceNo)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists contracts with pagination
    #[instrument(skip(self))]
    pub async fn list_contracts(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<contract::Model>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = contract::Entity::find()
            .order_by_desc(contract::Column::DraftedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let contracts = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((contracts, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signed_contract(signed_days_ago: i64) -> contract::Model {
        let mut model = contract::Model::new(
            "C-2024-001".to_string(),
            Uuid::new_v4(),
            None,
            None,
            Some(dec!(25000)),
            None,
        );
        model.status = ContractStatus::Signed;
        model.signed_at = Some(Utc::now() - Duration::days(signed_days_ago));
        model
    }

    #[test]
    fn signed_contract_within_window_is_active() {
        let view = project_contract(signed_contract(100), &[], 365, Utc::now());
        assert!(!view.is_expired);
        assert!(view.days_until_expiry.unwrap() > 0);
    }

    #[test]
    fn signed_contract_past_window_is_expired() {
        let view = project_contract(signed_contract(366), &[], 365, Utc::now());
        assert!(view.is_expired);
        assert!(view.days_until_expiry.unwrap() < 0);
    }

    #[test]
    fn expiry_boundary_follows_the_window_exactly() {
        let now = Utc::now();
        let mut on_boundary = signed_contract(0);
        on_boundary.signed_at = Some(now - Duration::days(365));
        let view = project_contract(on_boundary, &[], 365, now);
        // now - signed_at == window is not yet past it
        assert!(!view.is_expired);
    }

    #[test]
    fn drafted_contract_never_expires() {
        let model = contract::Model::new(
            "C-2024-002".to_string(),
            Uuid::new_v4(),
            None,
            None,
            None,
            Some(dec!(1200)),
        );
        let view = project_contract(model, &[], 365, Utc::now());
        assert!(!view.is_expired);
        assert_eq!(view.days_until_expiry, None);
    }

    #[test]
    fn stored_expired_status_is_respected() {
        let mut model = signed_contract(10);
        model.status = ContractStatus::Expired;
        let view = project_contract(model, &[], 365, Utc::now());
        assert!(view.is_expired);
    }

    #[test]
    fn installment_counts_are_aggregated() {
        let contract = signed_contract(10);
        let make_row = |status: InstallmentStatus, seq: i32| contract_installment::Model {
            id: Uuid::new_v4(),
            contract_id: contract.id,
            sequence_no: seq,
            amount: dec!(500),
            due_date: Utc::now(),
            status,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let rows = vec![
            make_row(InstallmentStatus::Paid, 1),
            make_row(InstallmentStatus::Paid, 2),
            make_row(InstallmentStatus::Overdue, 3),
            make_row(InstallmentStatus::Pending, 4),
        ];

        let view = project_contract(contract, &rows, 365, Utc::now());
        assert_eq!(
            view.installments,
            InstallmentSummary {
                total: 4,
                paid: 2,
                overdue: 1,
                pending: 1,
            }
        );
    }
}
