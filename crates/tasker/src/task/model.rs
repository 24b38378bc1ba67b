use core::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Progress of a task. Serialized as its integer value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum Status {
    #[default]
    Todo = 0,
    InProgress = 1,
    Done = 2,
}

impl Status {
    pub const ALL: [Status; 3] = [Self::Todo, Self::InProgress, Self::Done];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }
}

impl TryFrom<i32> for Status {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Todo),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Done),
            other => Err(Error::invalid("status", other)),
        }
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status as i32
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored task. `id` is the canonical decimal form of its
/// [`TaskId`](crate::TaskId) and never changes once assigned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: Status,
}

/// A field that an update mask can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Name,
    Status,
}

impl FieldPath {
    /// Parses a mask path. Paths may be qualified with `task.`; anything
    /// unrecognised yields `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim();
        let field = path.strip_prefix("task.").unwrap_or(path);
        match field {
            "name" => Some(Self::Name),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    /// Recognised fields named by `mask`, deduplicated, in mask order.
    pub fn from_mask<S: AsRef<str>>(mask: &[S]) -> Vec<Self> {
        let mut fields = Vec::with_capacity(2);
        for field in mask.iter().filter_map(|p| Self::parse(p.as_ref())) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}

/// Returns true when `value` is empty after trimming whitespace.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_only_known_values() {
        for status in Status::ALL {
            assert_eq!(Status::try_from(i32::from(status)), Ok(status));
        }
        for bad in [-1, 3, i32::MAX] {
            assert_eq!(
                Status::try_from(bad),
                Err(Error::InvalidValue {
                    field: "status",
                    value: bad.to_string()
                })
            );
        }
    }

    #[test]
    fn task_json_uses_integer_status() {
        let task = Task {
            id: "1".into(),
            name: "n".into(),
            status: Status::Done,
        };
        let json = serde_json::to_string(&task).unwrap();
        assert_eq!(json, r#"{"id":"1","name":"n","status":2}"#);
        assert_eq!(serde_json::from_str::<Task>(&json).unwrap(), task);
        assert!(serde_json::from_str::<Task>(r#"{"id":"1","name":"n","status":7}"#).is_err());
    }

    #[test]
    fn mask_paths_are_parsed_leniently() {
        assert_eq!(FieldPath::parse("name"), Some(FieldPath::Name));
        assert_eq!(FieldPath::parse("task.status"), Some(FieldPath::Status));
        assert_eq!(FieldPath::parse(" status "), Some(FieldPath::Status));
        assert_eq!(FieldPath::parse("id"), None);
        assert_eq!(FieldPath::parse("task.id"), None);
        assert_eq!(
            FieldPath::from_mask(&["status", "bogus", "task.status", "name"]),
            [FieldPath::Status, FieldPath::Name]
        );
    }

    #[test]
    fn blank_means_whitespace_only() {
        assert!(is_blank(""));
        assert!(is_blank(" \t\n"));
        assert!(!is_blank(" a "));
    }
}
