use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowStatus;

/// Enum representing the possible statuses of a deal.
#[derive(
    Clone, Debug, PartialEq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum DealStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "PendingManagerApproval")]
    PendingManagerApproval,
    #[sea_orm(string_value = "PendingSuperAdminApproval")]
    PendingSuperAdminApproval,
    #[sea_orm(string_value = "AccountCreationPending")]
    AccountCreationPending,
    #[sea_orm(string_value = "AccountCreated")]
    AccountCreated,
    #[sea_orm(string_value = "AwaitingReviews")]
    AwaitingReviews,
    #[sea_orm(string_value = "ReportSubmitted")]
    ReportSubmitted,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Failed")]
    Failed,
}

impl WorkflowStatus for DealStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use DealStatus::*;

        match (self, target) {
            // Manager approval accepts a deal straight from Draft
            (Draft, PendingManagerApproval) => true,
            (Draft, PendingSuperAdminApproval) => true,
            (PendingManagerApproval, PendingSuperAdminApproval) => true,
            (PendingSuperAdminApproval, AccountCreationPending) => true,
            (AccountCreationPending, AccountCreated) => true,
            (AccountCreated, AwaitingReviews) => true,
            // Reviews are not a precondition for the salesman report
            (AccountCreated, ReportSubmitted) => true,
            (AwaitingReviews, ReportSubmitted) => true,

            // Closing a deal is allowed from any non-terminal state
            (from, Completed) => !from.is_terminal(),
            (from, Failed) => !from.is_terminal(),

            _ => false,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Completed | DealStatus::Failed)
    }
}

/// One-time review steps modeled as an explicit sub-state instead of
/// nullable-text checks, so "already submitted" is a state-machine fact.
#[derive(
    Clone, Debug, PartialEq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ReviewProgress {
    #[sea_orm(string_value = "FirstPending")]
    FirstPending,
    #[sea_orm(string_value = "SecondPending")]
    SecondPending,
    #[sea_orm(string_value = "Completed")]
    Completed,
}

/// The `deals` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// The client this sales opportunity belongs to.
    pub client_id: Uuid,

    /// The salesman who owns the deal; ownership-gated steps check this.
    pub salesman_id: Uuid,

    pub status: DealStatus,

    /// Free-text description captured at creation.
    pub details: Option<String>,

    pub manager_approved: Option<bool>,
    pub manager_approval_notes: Option<String>,
    pub manager_approved_by: Option<Uuid>,
    pub manager_approved_at: Option<DateTime<Utc>>,

    pub super_admin_approved: Option<bool>,
    pub super_admin_approval_notes: Option<String>,
    pub super_admin_approved_by: Option<Uuid>,
    pub super_admin_approved_at: Option<DateTime<Utc>>,

    pub account_created_by: Option<Uuid>,
    pub account_created_at: Option<DateTime<Utc>>,

    pub review_progress: ReviewProgress,
    pub first_review: Option<String>,
    pub first_review_at: Option<DateTime<Utc>>,
    pub second_review: Option<String>,
    pub second_review_at: Option<DateTime<Utc>>,

    /// Client portal credentials recorded by the admin team. The actual
    /// secret is hashed upstream; this core only stores what it is handed.
    pub client_username: Option<String>,
    pub client_password: Option<String>,
    pub credentials_set_at: Option<DateTime<Utc>>,

    pub report_text: Option<String>,
    /// JSON-encoded array of attachment references.
    pub report_attachments: Option<String>,
    pub report_submitted_at: Option<DateTime<Utc>>,

    /// Notes recorded when the deal is completed or failed.
    pub closing_notes: Option<String>,

    pub legal_reviewed: bool,
    pub legal_reviewed_by: Option<Uuid>,
    pub legal_reviewed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Creates a new deal in Draft owned by the given salesman.
    pub fn new(client_id: Uuid, salesman_id: Uuid, details: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            salesman_id,
            status: DealStatus::Draft,
            details,
            manager_approved: None,
            manager_approval_notes: None,
            manager_approved_by: None,
            manager_approved_at: None,
            super_admin_approved: None,
            super_admin_approval_notes: None,
            super_admin_approved_by: None,
            super_admin_approved_at: None,
            account_created_by: None,
            account_created_at: None,
            review_progress: ReviewProgress::FirstPending,
            first_review: None,
            first_review_at: None,
            second_review: None,
            second_review_at: None,
            client_username: None,
            client_password: None,
            credentials_set_at: None,
            report_text: None,
            report_attachments: None,
            report_submitted_at: None,
            closing_notes: None,
            legal_reviewed: false,
            legal_reviewed_by: None,
            legal_reviewed_at: None,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    /// Whether a manager has recorded an approving decision.
    pub fn has_manager_approval(&self) -> bool {
        self.manager_approved == Some(true)
    }

    /// Whether the account-created milestone has been reached.
    pub fn account_is_created(&self) -> bool {
        self.account_created_at.is_some()
    }

    /// Whether client credentials have been recorded.
    pub fn credentials_are_set(&self) -> bool {
        self.credentials_set_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_chain_is_strictly_forward() {
        use DealStatus::*;

        assert!(Draft.can_transition_to(&PendingManagerApproval));
        assert!(PendingManagerApproval.can_transition_to(&PendingSuperAdminApproval));
        assert!(PendingSuperAdminApproval.can_transition_to(&AccountCreationPending));
        assert!(AccountCreationPending.can_transition_to(&AccountCreated));

        // No skipping or moving backwards
        assert!(!Draft.can_transition_to(&AccountCreationPending));
        assert!(!PendingSuperAdminApproval.can_transition_to(&Draft));
        assert!(!AccountCreated.can_transition_to(&PendingManagerApproval));
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        use DealStatus::*;

        for status in [
            Draft,
            PendingManagerApproval,
            PendingSuperAdminApproval,
            AccountCreationPending,
            AccountCreated,
            AwaitingReviews,
            ReportSubmitted,
        ] {
            assert!(status.can_transition_to(&Failed), "{status} -> Failed");
        }

        assert!(!Completed.can_transition_to(&Failed));
        assert!(!Failed.can_transition_to(&Completed));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        use DealStatus::*;

        for target in [
            Draft,
            PendingManagerApproval,
            PendingSuperAdminApproval,
            AccountCreationPending,
            AccountCreated,
            AwaitingReviews,
            ReportSubmitted,
            Completed,
            Failed,
        ] {
            assert!(!Completed.can_transition_to(&target));
            assert!(!Failed.can_transition_to(&target));
        }
    }

    #[test]
    fn new_deal_starts_in_draft_with_reviews_pending() {
        let deal = Model::new(Uuid::new_v4(), Uuid::new_v4(), Some("CT scanner".into()));
        assert_eq!(deal.status, DealStatus::Draft);
        assert_eq!(deal.review_progress, ReviewProgress::FirstPending);
        assert!(!deal.has_manager_approval());
        assert!(!deal.account_is_created());
        assert_eq!(deal.version, 1);
    }
}
