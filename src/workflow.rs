use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::entities::status_history;
use crate::errors::ServiceError;

/// The aggregate kinds managed by the workflow engines.
///
/// Used as the first half of the authorization policy key, as the
/// discriminator on status history rows, and in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum EntityKind {
    Deal,
    OfferRequest,
    Offer,
    Contract,
    SparePartRequest,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Deal => "Deal",
            EntityKind::OfferRequest => "OfferRequest",
            EntityKind::Offer => "Offer",
            EntityKind::Contract => "Contract",
            EntityKind::SparePartRequest => "SparePartRequest",
        }
    }
}

/// Implemented by every status enum in the crate.
///
/// `can_transition_to` encodes the full edge set of the machine as an
/// exhaustive match, so an unknown status is a compile-time error rather
/// than a silently-ignored string.
pub trait WorkflowStatus: Sized + PartialEq + std::fmt::Display {
    /// Whether the machine has an edge from `self` to `target`.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Whether no edges leave this state.
    fn is_terminal(&self) -> bool;
}

/// Validates a requested transition before any mutation is applied.
pub fn guard_transition<S: WorkflowStatus>(
    kind: EntityKind,
    entity_id: Uuid,
    from: &S,
    to: &S,
) -> Result<(), ServiceError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        warn!(
            entity = %kind,
            entity_id = %entity_id,
            from = %from,
            to = %to,
            "rejected state transition"
        );
        Err(ServiceError::InvalidStateTransition(format!(
            "{} {} cannot move from {} to {}",
            kind, entity_id, from, to
        )))
    }
}

/// Appends an audit row for a transition, inside the caller's transaction.
///
/// `status_from` is `None` for creation records. Every transition in every
/// machine writes exactly one row through this function.
pub async fn record_transition<C: ConnectionTrait>(
    conn: &C,
    kind: EntityKind,
    entity_id: Uuid,
    status_from: Option<String>,
    status_to: String,
    actor_id: Uuid,
    notes: Option<String>,
) -> Result<(), ServiceError> {
    let entry = status_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        entity_type: Set(kind.as_str().to_string()),
        entity_id: Set(entity_id),
        status_from: Set(status_from),
        status_to: Set(status_to),
        changed_by: Set(actor_id),
        notes: Set(notes),
        created_at: Set(Utc::now()),
    };

    entry.insert(conn).await.map_err(ServiceError::db_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_renders_stable_names() {
        assert_eq!(EntityKind::Deal.as_str(), "Deal");
        assert_eq!(EntityKind::SparePartRequest.as_str(), "SparePartRequest");
        assert_eq!(EntityKind::OfferRequest.to_string(), "OfferRequest");
    }
}
