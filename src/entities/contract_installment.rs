use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowStatus;

/// Enum representing the payment status of one installment row.
#[derive(
    Clone, Debug, PartialEq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum InstallmentStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Paid")]
    Paid,
    #[sea_orm(string_value = "Overdue")]
    Overdue,
}

impl WorkflowStatus for InstallmentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use InstallmentStatus::*;

        match (self, target) {
            (Pending, Paid) => true,
            (Pending, Overdue) => true,
            // A late installment can still be settled
            (Overdue, Paid) => true,
            _ => false,
        }
    }

    fn is_terminal(&self) -> bool {
        // Paid rows are immutable
        matches!(self, InstallmentStatus::Paid)
    }
}

/// The `contract_installments` table: the contract's payment schedule.
/// Status changes are driven by the external billing collaborator; this
/// core enforces the edges and aggregates counts for display.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contract_installments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub contract_id: Uuid,

    /// 1-based position within the schedule.
    pub sequence_no: i32,

    pub amount: Decimal,

    pub due_date: DateTime<Utc>,

    pub status: InstallmentStatus,

    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contract::Entity",
        from = "Column::ContractId",
        to = "super::contract::Column::Id",
        on_delete = "Cascade"
    )]
    Contract,
}

impl Related<super::contract::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contract.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
