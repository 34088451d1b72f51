//! Shared domain vocabulary: entity kinds, composite `(id, instance)` keys,
//! the upstream cursor policy, and the small enums threaded through the
//! mirror store, sync engine, exclusion engine, and query builders.

pub mod cursor;
mod entity;
mod kind;

pub use cursor::{Cursor, CursorError};
pub use entity::{EntityId, EntityIdError, InstanceId};
pub use kind::EntityKind;

/// Reason a `(user, kind, id, instance)` pair is present in the exclusion
/// index (§3 `UserExcludedEntity`, §4.4). Ordered: the first reason
/// encountered when assembling the set wins on conflict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Restricted,
    Hidden,
    Cascade,
    Empty,
}

/// `UserContentRestriction.mode` (§3, §4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RestrictionMode {
    Include,
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Validates the SQL-safety constraint every id crossing a sync boundary
/// must satisfy (§4.3 step 1): `^[A-Za-z0-9_-]+$`.
pub fn is_valid_upstream_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        assert!(is_valid_upstream_id("abc123"));
        assert!(is_valid_upstream_id("a-b_c"));
        assert!(!is_valid_upstream_id(""));
        assert!(!is_valid_upstream_id("abc def"));
        assert!(!is_valid_upstream_id("abc;drop table scenes"));
        assert!(!is_valid_upstream_id("abc/../etc"));
    }
}
