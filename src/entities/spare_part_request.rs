use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowStatus;

/// Enum representing the statuses of a spare part request. The chain is
/// strictly ordered; both rejection states and Delivered are terminal.
#[derive(
    Clone, Debug, PartialEq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SparePartStatus {
    #[sea_orm(string_value = "Requested")]
    Requested,
    #[sea_orm(string_value = "AvailabilityChecked")]
    AvailabilityChecked,
    #[sea_orm(string_value = "Priced")]
    Priced,
    #[sea_orm(string_value = "CustomerApproved")]
    CustomerApproved,
    #[sea_orm(string_value = "CustomerRejected")]
    CustomerRejected,
    #[sea_orm(string_value = "WarehouseApproved")]
    WarehouseApproved,
    #[sea_orm(string_value = "WarehouseRejected")]
    WarehouseRejected,
    #[sea_orm(string_value = "Ready")]
    Ready,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
}

impl WorkflowStatus for SparePartStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SparePartStatus::*;

        match (self, target) {
            (Requested, AvailabilityChecked) => true,
            (AvailabilityChecked, Priced) => true,
            (Priced, CustomerApproved) => true,
            (Priced, CustomerRejected) => true,
            (CustomerApproved, WarehouseApproved) => true,
            (CustomerApproved, WarehouseRejected) => true,
            (WarehouseApproved, Ready) => true,
            (Ready, Delivered) => true,
            _ => false,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            SparePartStatus::CustomerRejected
                | SparePartStatus::WarehouseRejected
                | SparePartStatus::Delivered
        )
    }
}

/// The `spare_part_requests` table: procurement of a replacement part
/// raised by an engineer during a maintenance visit.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "spare_part_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// The maintenance visit this request belongs to.
    pub maintenance_visit_id: Uuid,

    /// The engineer who raised the request (and receives the part).
    pub requested_by: Uuid,

    pub part_description: String,

    pub status: SparePartStatus,

    pub is_available: Option<bool>,
    pub availability_checked_by: Option<Uuid>,
    pub availability_checked_at: Option<DateTime<Utc>>,

    pub price: Option<Decimal>,
    pub priced_by: Option<Uuid>,
    pub priced_at: Option<DateTime<Utc>>,

    pub customer_notes: Option<String>,
    pub customer_decided_at: Option<DateTime<Utc>>,

    pub warehouse_notes: Option<String>,
    pub warehouse_decided_by: Option<Uuid>,
    pub warehouse_decided_at: Option<DateTime<Utc>>,

    pub ready_by: Option<Uuid>,
    pub ready_at: Option<DateTime<Utc>>,

    pub delivered_to: Option<Uuid>,
    pub delivered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(maintenance_visit_id: Uuid, requested_by: Uuid, part_description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            maintenance_visit_id,
            requested_by,
            part_description,
            status: SparePartStatus::Requested,
            is_available: None,
            availability_checked_by: None,
            availability_checked_at: None,
            price: None,
            priced_by: None,
            priced_at: None,
            customer_notes: None,
            customer_decided_at: None,
            warehouse_notes: None,
            warehouse_decided_by: None,
            warehouse_decided_at: None,
            ready_by: None,
            ready_at: None,
            delivered_to: None,
            delivered_at: None,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_is_strictly_ordered() {
        use SparePartStatus::*;

        assert!(Requested.can_transition_to(&AvailabilityChecked));
        assert!(AvailabilityChecked.can_transition_to(&Priced));
        assert!(Priced.can_transition_to(&CustomerApproved));
        assert!(CustomerApproved.can_transition_to(&WarehouseApproved));
        assert!(WarehouseApproved.can_transition_to(&Ready));
        assert!(Ready.can_transition_to(&Delivered));

        // No skipping stages
        assert!(!Requested.can_transition_to(&Priced));
        assert!(!AvailabilityChecked.can_transition_to(&CustomerApproved));
        assert!(!CustomerApproved.can_transition_to(&Ready));
        assert!(!WarehouseApproved.can_transition_to(&Delivered));
    }

    #[test]
    fn rejections_and_delivery_are_terminal() {
        use SparePartStatus::*;

        for terminal in [CustomerRejected, WarehouseRejected, Delivered] {
            assert!(terminal.is_terminal());
            for target in [
                Requested,
                AvailabilityChecked,
                Priced,
                CustomerApproved,
                WarehouseApproved,
                Ready,
                Delivered,
            ] {
                assert!(!terminal.can_transition_to(&target));
            }
        }
    }
}
