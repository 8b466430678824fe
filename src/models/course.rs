use serde::{Deserialize, Serialize};

/// The platform's root/site course. Never a recommendation candidate.
pub const SITE_COURSE_ID: i64 = 1;

/// A course as returned by the learning platform.
///
/// Field names follow the platform's wire format so course payloads
/// deserialize directly; absent fields default to empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    pub id: i64,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, rename = "categoryid")]
    pub category_id: i64,
    #[serde(default, rename = "categoryname")]
    pub category_name: String,
    /// Creation time as a unix timestamp in seconds
    #[serde(default, rename = "timecreated")]
    pub time_created: i64,
}

impl Course {
    /// Whether this is the reserved site course
    pub fn is_site_course(&self) -> bool {
        self.id == SITE_COURSE_ID
    }
}

/// A short text label attached to a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

/// A user enrolled in a course
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrolledUser {
    pub id: i64,
    #[serde(default)]
    pub fullname: String,
}
