//! Static component descriptors returned by `get-meta`.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::json;

/// Whether the component drives hardware or reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// Domain of one state variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// `[true, false]`
    Boolean,
    /// An enumerated set of integer levels, e.g. `[0, 1]`.
    Levels(Vec<i64>),
    /// Inclusive integer range, rendered as `"min-max"`.
    Range { min: i64, max: i64 },
    /// Any finite number.
    Float,
    /// Free-form text, e.g. a file path.
    Text,
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Boolean => json!([true, false]).serialize(serializer),
            Self::Levels(levels) => levels.serialize(serializer),
            Self::Range { min, max } => serializer.serialize_str(&format!("{min}-{max}")),
            Self::Float => serializer.serialize_str("float"),
            Self::Text => serializer.serialize_str("string"),
        }
    }
}

/// Set once at construction, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub dir: Direction,
    pub variables: BTreeMap<String, Domain>,
}

impl Meta {
    pub fn new(kind: &'static str, dir: Direction) -> Self {
        Self {
            kind,
            dir,
            variables: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.variables.insert(name.into(), domain);
        self
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}
