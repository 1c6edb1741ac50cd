//! Task identifiers.
//!
//! IDs are ULIDs rendered with a `task-` prefix:
//! - sortable by creation time (timestamp is the leading component)
//! - generated without coordination
//! - 128-bit, so collisions are practically impossible (the queue still checks)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

const PREFIX: &str = "task-";

/// Identifier of a registration task.
///
/// Serialized as its display form (`task-01J...`) so it can travel through URLs
/// and JSON unchanged.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TaskId(Ulid);

impl TaskId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task id `{0}`")]
pub struct ParseTaskIdError(String);

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    /// Accepts both the prefixed form and a bare ULID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|_| ParseTaskIdError(s.to_string()))
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TaskId {
    type Error = ParseTaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
