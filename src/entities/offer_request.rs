use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowStatus;

/// Enum representing the possible statuses of an offer request.
#[derive(
    Clone, Debug, PartialEq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OfferRequestStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "InProgress")]
    InProgress,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
}

impl WorkflowStatus for OfferRequestStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OfferRequestStatus::*;

        match (self, target) {
            (Pending, Assigned) => true,
            (Assigned, InProgress) => true,
            (InProgress, Completed) => true,
            (from, Rejected) => !from.is_terminal(),
            _ => false,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            OfferRequestStatus::Completed | OfferRequestStatus::Rejected
        )
    }
}

/// The `offer_requests` table: a salesman's ask for sales support to
/// prepare a commercial offer.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offer_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub client_id: Uuid,

    /// The salesman who raised the request.
    pub requester_id: Uuid,

    /// The sales-support user responsible for producing the offer.
    /// Auto-resolved at creation and reassignable afterwards.
    pub assigned_support_id: Uuid,

    /// The offer produced for this request, linked by id once it exists.
    pub offer_id: Option<Uuid>,

    pub status: OfferRequestStatus,

    pub details: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(
        client_id: Uuid,
        requester_id: Uuid,
        assigned_support_id: Uuid,
        details: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            requester_id,
            assigned_support_id,
            offer_id: None,
            status: OfferRequestStatus::Pending,
            details,
            notes: None,
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
    fn progression_is_linear() {
        use OfferRequestStatus::*;

        assert!(Pending.can_transition_to(&Assigned));
        assert!(Assigned.can_transition_to(&InProgress));
        assert!(InProgress.can_transition_to(&Completed));

        assert!(!Pending.can_transition_to(&InProgress));
        assert!(!Pending.can_transition_to(&Completed));
        assert!(!Assigned.can_transition_to(&Completed));
    }

    #[test]
    fn rejection_is_reachable_until_terminal() {
        use OfferRequestStatus::*;

        assert!(Pending.can_transition_to(&Rejected));
        assert!(Assigned.can_transition_to(&Rejected));
        assert!(InProgress.can_transition_to(&Rejected));
        assert!(!Completed.can_transition_to(&Rejected));
        assert!(!Rejected.can_transition_to(&Rejected));
    }
}
