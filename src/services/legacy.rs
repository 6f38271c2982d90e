use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// A contract record as reported by the legacy TBS system. Read-only; the
/// legacy schema is deliberately not folded into the core data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyContractRecord {
    pub legacy_id: String,
    pub contract_number: String,
    pub customer_name: String,
    pub signed_at: Option<DateTime<Utc>>,
}

/// Lookup interface into the legacy TBS database.
#[async_trait]
pub trait LegacyContractLookup: Send + Sync {
    async fn find(&self, legacy_id: &str) -> Result<Option<LegacyContractRecord>, ServiceError>;
}

/// In-memory lookup used by tests and local development.
#[derive(Default)]
pub struct InMemoryLegacyContracts {
    records: HashMap<String, LegacyContractRecord>,
}

impl InMemoryLegacyContracts {
    pub fn from_records(records: impl IntoIterator<Item = LegacyContractRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.legacy_id.clone(), record))
                .collect(),
        }
    }
}

#[async_trait]
impl LegacyContractLookup for InMemoryLegacyContracts {
    async fn find(&self, legacy_id: &str) -> Result<Option<LegacyContractRecord>, ServiceError> {
        Ok(self.records.get(legacy_id).cloned())
    }
}
