use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Resolves which sales-support user a new offer request is assigned to.
///
/// The assignment policy is a deployment concern; the engine only requires
/// that creation always yields an assignee.
#[async_trait]
pub trait SupportAssignment: Send + Sync {
    async fn next_support(&self) -> Result<Uuid, ServiceError>;
}

/// Default policy: rotate through a fixed roster of support users.
pub struct RoundRobinAssignment {
    roster: Vec<Uuid>,
    cursor: AtomicUsize,
}

impl RoundRobinAssignment {
    pub fn new(roster: Vec<Uuid>) -> Self {
        Self {
            roster,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SupportAssignment for RoundRobinAssignment {
    async fn next_support(&self) -> Result<Uuid, ServiceError> {
        if self.roster.is_empty() {
            return Err(ServiceError::InternalError(
                "sales support roster is empty".to_string(),
            ));
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.roster.len();
        Ok(self.roster[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rotation_covers_the_roster() {
        let roster = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let assignment = RoundRobinAssignment::new(roster.clone());

        for expected in roster.iter().chain(roster.iter()) {
            assert_eq!(assignment.next_support().await.unwrap(), *expected);
        }
    }

    #[tokio::test]
    async fn empty_roster_is_an_error() {
        let assignment = RoundRobinAssignment::new(Vec::new());
        assert!(assignment.next_support().await.is_err());
    }
}
