use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowStatus;

/// Enum representing the possible statuses of a contract.
///
/// `Expired` exists so that rows written by the legacy system still
/// deserialize; it is never a transition target. Whether a contract is
/// expired is a read-time projection over `signed_at` and the configured
/// validity window (see `services::contracts::ContractView`).
#[derive(
    Clone, Debug, PartialEq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ContractStatus {
    #[sea_orm(string_value = "Drafted")]
    Drafted,
    #[sea_orm(string_value = "SentToCustomer")]
    SentToCustomer,
    #[sea_orm(string_value = "Signed")]
    Signed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
    #[sea_orm(string_value = "Expired")]
    Expired,
}

impl WorkflowStatus for ContractStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ContractStatus::*;

        match (self, target) {
            (Drafted, SentToCustomer) => true,
            (SentToCustomer, Signed) => true,
            (Drafted, Cancelled) => true,
            (SentToCustomer, Cancelled) => true,
            (Signed, Cancelled) => true,
            _ => false,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Cancelled | ContractStatus::Expired)
    }
}

/// The `contracts` table: the binding agreement resulting from a signed
/// deal, possibly linked to a legacy-system record by id.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub contract_number: String,

    pub client_id: Uuid,

    /// The deal this contract resulted from, when known.
    pub deal_id: Option<Uuid>,

    pub status: ContractStatus,

    pub terms: Option<String>,

    /// Exactly one of `cash_amount` / `installment_amount` is set.
    pub cash_amount: Option<Decimal>,
    pub installment_amount: Option<Decimal>,

    /// Cross-system link into the legacy TBS database; validated against
    /// the lookup collaborator, never dereferenced by this core.
    pub legacy_contract_id: Option<String>,

    pub drafted_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub signed_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancel_reason: Option<String>,

    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::contract_installment::Entity")]
    Installments,
}

impl Related<super::contract_installment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Installments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(
        contract_number: String,
        client_id: Uuid,
        deal_id: Option<Uuid>,
        terms: Option<String>,
        cash_amount: Option<Decimal>,
        installment_amount: Option<Decimal>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            contract_number,
            client_id,
            deal_id,
            status: ContractStatus::Drafted,
            terms,
            cash_amount,
            installment_amount,
            legacy_contract_id: None,
            drafted_at: Utc::now(),
            sent_at: None,
            signed_at: None,
            signed_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
            updated_at: None,
            version: 1,
        }
    }
}
