use crate::error::BatchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheme token prefixing every canonical location key.
const SCHEME: &str = "i4x:";

/// Category assumed for references that carry no category of their own.
const DEFAULT_CATEGORY: &str = "problem";

/// Canonical identifier of one gradable item within a course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey(String);

impl LocationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<LocationKey> for String {
    fn from(key: LocationKey) -> Self {
        key.0
    }
}

/// Resolve a staff-entered problem reference against a course id.
///
/// Accepts a bare short name (`hw1`), an `.xml`-suffixed name (`hw1.xml`),
/// a category-qualified path (`problem/hw1`), or an already fully-qualified
/// key, which passes through unchanged. A reference with no category is
/// assumed to name a problem-category item, even though nothing else in the
/// engine is problem-specific.
///
/// The course id must split into exactly three `/`-separated components
/// (organization, course name, run); the run participates in validation
/// only, not in the composed key.
pub fn resolve_location(course_id: &str, problem_ref: &str) -> Result<LocationKey, BatchError> {
    if problem_ref.starts_with(SCHEME) {
        return Ok(LocationKey(problem_ref.to_string()));
    }

    let name = problem_ref.strip_suffix(".xml").unwrap_or(problem_ref);
    let qualified = if name.contains('/') {
        name.to_string()
    } else {
        format!("{DEFAULT_CATEGORY}/{name}")
    };

    let mut parts = course_id.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(org), Some(course), Some(_run), None) => {
            Ok(LocationKey(format!("{SCHEME}//{org}/{course}/{qualified}")))
        }
        _ => Err(BatchError::MalformedCourseIdentifier(course_id.to_string())),
    }
}
