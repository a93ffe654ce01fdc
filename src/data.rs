use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Column name -> cell value, in the order the backend sent them.
pub type FieldMap = IndexMap<String, String>;

/// One student as echoed back by the backend. The attribute and availability
/// keys come from the uploaded roster, so nothing here assumes a schema.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Student {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_fields")]
    pub attributes: FieldMap,
    #[serde(default, deserialize_with = "lenient_fields")]
    pub availabilities: FieldMap,
}

/// A group of students. The unassigned group holds students that had no
/// viable time slot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Group {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub time_slot: Option<String>,
    #[serde(default)]
    pub is_unassigned: bool,
}

/// What the backend sends back from an upload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GroupingResult {
    Groups { groups: Vec<Group> },
    Failed { error: String },
}

impl GroupingResult {
    pub fn groups(&self) -> &[Group] {
        match self {
            GroupingResult::Groups { groups } => groups,
            GroupingResult::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            GroupingResult::Failed { error } => Some(error),
            GroupingResult::Groups { .. } => None,
        }
    }

    pub fn regular_groups(&self) -> impl Iterator<Item = &Group> {
        self.groups().iter().filter(|g| !g.is_unassigned)
    }

    pub fn unassigned(&self) -> Option<&Group> {
        self.groups().iter().find(|g| g.is_unassigned)
    }

    /// First student of the first group; its keys define the export columns.
    /// `None` when there are no groups or the first one is empty.
    pub fn first_student(&self) -> Option<&Student> {
        self.groups().first().and_then(|g| g.students.first())
    }

    pub fn student_count(&self) -> usize {
        self.groups().iter().map(|g| g.students.len()).sum()
    }
}

/// A successful upload, as handed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
    pub data: GroupingResult,
}

/// Answer from the backend's health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub success: bool,
    pub message: String,
    pub data: Value,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message, self.data)
    }
}

// roster cells may come back as numbers or booleans depending on how the
// backend read the file; keep their text form
fn lenient_fields<'de, D>(deserializer: D) -> Result<FieldMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value_text(value)))
        .collect())
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
