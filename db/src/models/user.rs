use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Represents a learner account in the `users` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Email address. Expected unique, but uniqueness is enforced at
    /// resolution time rather than in the schema.
    pub email: String,
    /// Whether the account still has course access.
    pub active: bool,
    /// Timestamp when the account was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the account was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Defines relationships between `users` and other tables.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Per-problem state rows owned by this account.
    #[sea_orm(has_many = "super::student_state::Entity")]
    StudentState,
}

impl Related<super::student_state::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentState.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
