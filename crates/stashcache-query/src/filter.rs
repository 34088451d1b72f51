//! Typed filter clauses accepted by a kind's query builder (§4.5). One
//! `FilterClause` per active filter; the builder rejects an unknown
//! column name for the kind rather than emitting arbitrary SQL.

use stashcache_core::EntityKind;

/// Modifier wire names match §4.5 exactly (`INCLUDES`, `NOT_BETWEEN`, ...)
/// so a request body's filter bag can deserialize straight into these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdModifier {
    Includes,
    Excludes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextModifier {
    Includes,
    Excludes,
    Equals,
    NotEquals,
    IsNull,
    NotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumericModifier {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Between,
    NotBetween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateModifier {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Between,
    NotBetween,
    IsNull,
    NotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JunctionModifier {
    Includes,
    IncludesAll,
    Excludes,
}

/// One clause of a kind's filter set (§4.5). `field`/`other_kind` names
/// are validated against the kind's closed column set by
/// [`crate::meta::KindMeta`] when the builder assembles SQL.
#[derive(Debug, Clone)]
pub enum FilterClause {
    Id { field: &'static str, modifier: IdModifier, ids: Vec<String> },
    Text { field: &'static str, modifier: TextModifier, value: Option<String> },
    Numeric { field: &'static str, modifier: NumericModifier, value: f64, value2: Option<f64> },
    Date { field: &'static str, modifier: DateModifier, value: Option<String>, value2: Option<String> },
    Favorite { value: bool },
    /// Tag/studio hierarchy filter: `depth` 0 means "self only", n>0
    /// expands to descendants to that depth before the clause is emitted.
    Hierarchy { kind: EntityKind, ids: Vec<String>, depth: u32, modifier: IdModifier },
    Junction { other_kind: EntityKind, modifier: JunctionModifier, ids: Vec<String> },
}
