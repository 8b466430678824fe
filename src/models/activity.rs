use serde::{Deserialize, Serialize};

/// One section of a course's content tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modules: Vec<Activity>,
}

/// An activity (module) inside a course section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Module type, e.g. "quiz", "resource", "forum"
    #[serde(default, rename = "modname")]
    pub mod_type: String,
}

/// Per-user completion report for one course
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionReport {
    #[serde(default)]
    pub statuses: Vec<CompletionStatus>,
}

/// Completion state of one activity for one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionStatus {
    /// Course-module id of the activity; 0 means no usable reference
    pub cmid: i64,
    /// Completion state; 1 means completed
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub viewed: bool,
}

impl CompletionStatus {
    pub fn is_completed(&self) -> bool {
        self.state == 1
    }
}

impl CompletionReport {
    /// Ids of activities the user has completed
    pub fn completed_ids(&self) -> Vec<i64> {
        self.statuses
            .iter()
            .filter(|s| s.cmid != 0 && s.is_completed())
            .map(|s| s.cmid)
            .collect()
    }
}
