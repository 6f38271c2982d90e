use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowStatus;

/// Enum representing the possible statuses of an offer.
#[derive(
    Clone, Debug, PartialEq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OfferStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "SentToSalesman")]
    SentToSalesman,
    #[sea_orm(string_value = "Accepted")]
    Accepted,
    #[sea_orm(string_value = "Rejected")]
    Rejected,
}

impl OfferStatus {
    /// Equipment, terms, and installment plans may only change in Draft.
    pub fn is_editable(&self) -> bool {
        matches!(self, OfferStatus::Draft)
    }
}

impl WorkflowStatus for OfferStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OfferStatus::*;

        match (self, target) {
            (Draft, SentToSalesman) => true,
            (SentToSalesman, Accepted) => true,
            (SentToSalesman, Rejected) => true,
            _ => false,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Accepted | OfferStatus::Rejected)
    }
}

/// The `offers` table: a priced, itemized proposal prepared by sales
/// support in response to a request (or standalone).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub client_id: Uuid,

    /// The sales-support user who prepared the offer.
    pub created_by: Uuid,

    /// Originating request, when the offer was not created standalone.
    pub offer_request_id: Option<Uuid>,

    /// The salesman the offer is (or will be) sent to.
    pub salesman_id: Option<Uuid>,

    pub status: OfferStatus,

    pub terms: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::offer_equipment::Entity")]
    Equipment,
    #[sea_orm(has_many = "super::offer_installment::Entity")]
    Installments,
}

impl Related<super::offer_equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl Related<super::offer_installment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Installments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn new(
        client_id: Uuid,
        created_by: Uuid,
        offer_request_id: Option<Uuid>,
        salesman_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            created_by,
            offer_request_id,
            salesman_id,
            status: OfferStatus::Draft,
            terms: None,
            created_at: Utc::now(),
            updated_at: None,
            sent_at: None,
            decided_at: None,
            version: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_draft_is_editable() {
        assert!(OfferStatus::Draft.is_editable());
        assert!(!OfferStatus::SentToSalesman.is_editable());
        assert!(!OfferStatus::Accepted.is_editable());
        assert!(!OfferStatus::Rejected.is_editable());
    }

    #[test]
    fn decision_edges_require_a_sent_offer() {
        use OfferStatus::*;

        assert!(Draft.can_transition_to(&SentToSalesman));
        assert!(SentToSalesman.can_transition_to(&Accepted));
        assert!(SentToSalesman.can_transition_to(&Rejected));

        assert!(!Draft.can_transition_to(&Accepted));
        assert!(!Draft.can_transition_to(&Rejected));
        assert!(!Accepted.can_transition_to(&Rejected));
    }
}
