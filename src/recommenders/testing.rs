//! In-memory platform and profile fixtures for strategy tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::db::InterestSource;
use crate::error::AppResult;
use crate::models::{
    Activity, CompletionReport, CompletionStatus, Course, EnrolledUser, Section, Tag,
};
use crate::services::LearningPlatform;

/// Learning platform backed by fixture data.
///
/// Enrollment is held per user; enrolled-user listings are derived from it
/// and sorted by user id so results are deterministic.
#[derive(Default)]
pub struct StubPlatform {
    pub courses: Vec<Course>,
    pub enrollments: HashMap<i64, Vec<i64>>,
    pub contents: HashMap<i64, Vec<Section>>,
    pub completions: HashMap<(i64, i64), CompletionReport>,
    pub tags: HashMap<i64, Vec<String>>,
}

#[async_trait]
impl LearningPlatform for StubPlatform {
    async fn site_courses(&self) -> AppResult<Vec<Course>> {
        Ok(self.courses.clone())
    }

    async fn user_courses(&self, user_id: i64) -> AppResult<Vec<Course>> {
        let enrolled = self.enrollments.get(&user_id).cloned().unwrap_or_default();
        Ok(self
            .courses
            .iter()
            .filter(|course| enrolled.contains(&course.id))
            .cloned()
            .collect())
    }

    async fn course_contents(&self, course_id: i64) -> AppResult<Vec<Section>> {
        Ok(self.contents.get(&course_id).cloned().unwrap_or_default())
    }

    async fn enrolled_users(&self, course_id: i64) -> AppResult<Vec<EnrolledUser>> {
        let mut users: Vec<EnrolledUser> = self
            .enrollments
            .iter()
            .filter(|(_, courses)| courses.contains(&course_id))
            .map(|(&user_id, _)| EnrolledUser {
                id: user_id,
                fullname: format!("User {}", user_id),
            })
            .collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    async fn completion_status(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> AppResult<CompletionReport> {
        Ok(self
            .completions
            .get(&(user_id, course_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn course_tags(&self, course_id: i64) -> AppResult<Vec<Tag>> {
        Ok(self
            .tags
            .get(&course_id)
            .map(|names| {
                names
                    .iter()
                    .map(|name| Tag {
                        id: None,
                        name: name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn all_course_tags(&self) -> AppResult<HashMap<i64, Vec<String>>> {
        Ok(self.tags.clone())
    }
}

/// Interest source backed by fixture data
#[derive(Default)]
pub struct StubProfiles {
    pub interests: HashMap<i64, Vec<String>>,
}

#[async_trait]
impl InterestSource for StubProfiles {
    async fn interests(&self, user_id: i64) -> AppResult<Vec<String>> {
        Ok(self.interests.get(&user_id).cloned().unwrap_or_default())
    }
}

pub fn course(id: i64, fullname: &str, summary: &str, time_created: i64) -> Course {
    Course {
        id,
        fullname: fullname.to_string(),
        summary: summary.to_string(),
        category_id: 1,
        category_name: String::new(),
        time_created,
    }
}

pub fn activity(id: i64, name: &str, description: &str) -> Activity {
    Activity {
        id,
        name: name.to_string(),
        description: description.to_string(),
        mod_type: "resource".to_string(),
    }
}

pub fn section(id: i64, modules: Vec<Activity>) -> Section {
    Section {
        id,
        name: format!("Section {}", id),
        modules,
    }
}

pub fn status(cmid: i64, state: i32, viewed: bool) -> CompletionStatus {
    CompletionStatus { cmid, state, viewed }
}

pub fn report(statuses: Vec<CompletionStatus>) -> CompletionReport {
    CompletionReport { statuses }
}
