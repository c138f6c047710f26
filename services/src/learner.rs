use crate::error::BatchError;
use db::models::user::{self, Column as UserColumn, Entity as UserEntity};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};

/// Resolve a staff-entered learner identifier to exactly one account.
///
/// An identifier containing `@` is matched on email, anything else on
/// username. Zero matches fail. So do two: either field matching twice
/// means the account data itself is inconsistent, and picking one silently
/// would hide that from the operator.
pub async fn resolve_learner(
    db: &DatabaseConnection,
    identifier: &str,
) -> Result<user::Model, BatchError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(BatchError::LearnerNotFound(identifier.to_string()));
    }

    let column = if identifier.contains('@') {
        UserColumn::Email
    } else {
        UserColumn::Username
    };

    // LIMIT 2 detects multiplicity without loading the table.
    let mut matches = UserEntity::find()
        .filter(column.eq(identifier))
        .limit(2)
        .all(db)
        .await?;

    if matches.len() > 1 {
        return Err(BatchError::AmbiguousLearner(identifier.to_string()));
    }

    matches
        .pop()
        .ok_or_else(|| BatchError::LearnerNotFound(identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use db::test_utils::setup_test_db;
    use sea_orm::{ActiveModelTrait, Set};

    async fn insert_user(db: &DatabaseConnection, username: &str, email: &str) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert user")
    }

    #[tokio::test]
    async fn resolves_by_username() {
        let db = setup_test_db().await;
        let alice = insert_user(&db, "alice", "alice@example.com").await;
        insert_user(&db, "bob", "bob@example.com").await;

        let found = resolve_learner(&db, "alice").await.unwrap();
        assert_eq!(found.id, alice.id);
    }

    #[tokio::test]
    async fn resolves_by_email_when_identifier_contains_at() {
        let db = setup_test_db().await;
        let bob = insert_user(&db, "bob", "bob@example.com").await;

        let found = resolve_learner(&db, "bob@example.com").await.unwrap();
        assert_eq!(found.id, bob.id);
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let db = setup_test_db().await;
        insert_user(&db, "alice", "alice@example.com").await;

        let err = resolve_learner(&db, "mallory").await.unwrap_err();
        assert!(matches!(err, BatchError::LearnerNotFound(_)));

        let err = resolve_learner(&db, "mallory@example.com").await.unwrap_err();
        assert!(matches!(err, BatchError::LearnerNotFound(_)));
    }

    #[tokio::test]
    async fn blank_identifier_is_not_found() {
        let db = setup_test_db().await;

        let err = resolve_learner(&db, "   ").await.unwrap_err();
        assert!(matches!(err, BatchError::LearnerNotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_surfaced_as_ambiguous() {
        let db = setup_test_db().await;
        insert_user(&db, "alice", "shared@example.com").await;
        insert_user(&db, "alice2", "shared@example.com").await;

        let err = resolve_learner(&db, "shared@example.com").await.unwrap_err();
        assert!(matches!(err, BatchError::AmbiguousLearner(ref id) if id == "shared@example.com"));
    }
}
