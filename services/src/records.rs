use crate::location::LocationKey;
use db::models::student_state::{self, Column as StateColumn, Entity as StateEntity};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Default number of rows fetched per keyset step.
const PAGE_SIZE: u64 = 100;

/// The persisted state rows addressed by one batch invocation: every row
/// for (course, location), optionally narrowed to a single learner.
///
/// Enumeration is ordered by learner id and keyset-paginated: each page is
/// a fresh query against current persisted state, so the sweep tolerates an
/// unbounded record set and rows deleted mid-sweep, and promises no
/// snapshot isolation. Rows inserted behind the cursor are not visited.
#[derive(Debug, Clone)]
pub struct RecordSet {
    course_id: String,
    location: LocationKey,
    user_id: Option<i64>,
    page_size: u64,
}

impl RecordSet {
    pub fn new(course_id: impl Into<String>, location: LocationKey) -> Self {
        Self {
            course_id: course_id.into(),
            location,
            user_id: None,
            page_size: PAGE_SIZE,
        }
    }

    /// Narrow the set to one learner's row.
    pub fn for_learner(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn location(&self) -> &LocationKey {
        &self.location
    }

    /// Fetch the next page of rows whose learner id is strictly greater
    /// than `cursor` (or the first page when `cursor` is `None`).
    pub async fn page_after(
        &self,
        db: &DatabaseConnection,
        cursor: Option<i64>,
    ) -> Result<Vec<student_state::Model>, DbErr> {
        let mut query = StateEntity::find()
            .filter(StateColumn::CourseId.eq(self.course_id.as_str()))
            .filter(StateColumn::Location.eq(self.location.as_str()))
            .order_by_asc(StateColumn::UserId)
            .limit(self.page_size);

        if let Some(user_id) = self.user_id {
            query = query.filter(StateColumn::UserId.eq(user_id));
        }
        if let Some(cursor) = cursor {
            query = query.filter(StateColumn::UserId.gt(cursor));
        }

        query.all(db).await
    }
}
