use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::models::user;

/// JSON key under which a problem stores its attempt counter.
pub const ATTEMPTS_KEY: &str = "attempts";

/// One learner's persisted interaction state with one gradable problem.
///
/// Exactly one row exists per (course, location, learner); the row is
/// created on first interaction and carries an opaque serialized state
/// blob owned by the problem implementation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "student_states")]
pub struct Model {
    /// Primary key of the state row.
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Course offering the row belongs to, stored verbatim.
    pub course_id: String,
    /// Canonical location key of the problem.
    pub location: String,
    /// ID of the learner who owns the state.
    pub user_id: i64,
    /// Opaque serialized state blob (JSON).
    pub state: String,
    /// Timestamp when the row was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Defines relationships between `student_states` and other tables.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Link to the learner who owns the state.
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Attempt counter from the state blob, if the blob parses as a JSON
    /// object carrying an integral counter.
    pub fn attempts(&self) -> Option<i64> {
        serde_json::from_str::<serde_json::Value>(&self.state)
            .ok()?
            .get(ATTEMPTS_KEY)?
            .as_i64()
    }
}
