use std::fmt;

use snafu::Snafu;

use crate::is_valid_upstream_id;

/// Identifies one upstream source. The empty string means "legacy /
/// single-instance mode" on a mirror row (treated as a member of every
/// instance filter) or "applies to all instances" on a user overlay row
/// (§3 Invariants).
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub const GLOBAL: InstanceId = InstanceId(String::new());

    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum EntityIdError {
    #[snafu(display("id {id:?} does not match ^[A-Za-z0-9_-]+$"))]
    InvalidId { id: String },
}

/// A composite `(id, instance)` key, the primary identifier of every
/// mirrored and junction row (§3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct EntityId {
    pub id: String,
    pub instance: InstanceId,
}

impl EntityId {
    pub fn new(id: impl Into<String>, instance: InstanceId) -> Result<Self, EntityIdError> {
        let id = id.into();
        if !is_valid_upstream_id(&id) {
            return Err(EntityIdError::InvalidId { id });
        }
        Ok(Self { id, instance })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsafe_ids() {
        assert!(EntityId::new("abc", InstanceId::from("i1")).is_ok());
        assert!(EntityId::new("abc def", InstanceId::from("i1")).is_err());
        assert!(EntityId::new("'; DROP TABLE scenes; --", InstanceId::GLOBAL).is_err());
    }

    #[test]
    fn global_instance_is_empty_string() {
        assert!(InstanceId::GLOBAL.is_global());
        assert!(InstanceId::default().is_global());
    }
}
