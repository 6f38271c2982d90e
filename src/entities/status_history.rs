use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The `status_history` table: one row per transition across all four
/// workflow machines. Written inside the same transaction as the
/// transition it records.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "status_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Which machine the row belongs to, as rendered by
    /// `workflow::EntityKind::as_str`.
    pub entity_type: String,

    #[sea_orm(indexed)]
    pub entity_id: Uuid,

    /// None for creation records.
    pub status_from: Option<String>,
    pub status_to: String,

    pub changed_by: Uuid,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
