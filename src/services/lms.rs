use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::db::{CacheKey, ResponseCache};
use crate::error::{AppError, AppResult};
use crate::models::{CompletionReport, Course, EnrolledUser, Section, Tag};

/// Data access contract for the learning platform.
///
/// Every call returns an explicit error instead of panicking; recommenders
/// treat a failed call the same as "no data" and take their fallback path.
/// The batched lookups have sequential default implementations; the real
/// client overrides them with a bounded parallel fan-out.
#[async_trait]
pub trait LearningPlatform: Send + Sync {
    async fn site_courses(&self) -> AppResult<Vec<Course>>;

    async fn user_courses(&self, user_id: i64) -> AppResult<Vec<Course>>;

    async fn course_contents(&self, course_id: i64) -> AppResult<Vec<Section>>;

    async fn enrolled_users(&self, course_id: i64) -> AppResult<Vec<EnrolledUser>>;

    async fn completion_status(&self, user_id: i64, course_id: i64)
        -> AppResult<CompletionReport>;

    async fn course_tags(&self, course_id: i64) -> AppResult<Vec<Tag>>;

    /// Tags for every course in one call, keyed by course id. Must agree
    /// with per-course `course_tags` results.
    async fn all_course_tags(&self) -> AppResult<HashMap<i64, Vec<String>>>;

    /// Enrolled users for many courses. Failed lookups yield empty lists.
    async fn enrolled_users_batch(&self, course_ids: &[i64]) -> HashMap<i64, Vec<EnrolledUser>> {
        let mut results = HashMap::new();
        for &course_id in course_ids {
            match self.enrolled_users(course_id).await {
                Ok(users) => {
                    results.insert(course_id, users);
                }
                Err(e) => {
                    tracing::warn!(course_id, error = %e, "Enrolled-users lookup failed");
                    results.insert(course_id, Vec::new());
                }
            }
        }
        results
    }

    /// Completion reports for many users within one course. Failed lookups
    /// yield empty reports.
    async fn completion_status_batch(
        &self,
        user_ids: &[i64],
        course_id: i64,
    ) -> HashMap<i64, CompletionReport> {
        let mut results = HashMap::new();
        for &user_id in user_ids {
            match self.completion_status(user_id, course_id).await {
                Ok(report) => {
                    results.insert(user_id, report);
                }
                Err(e) => {
                    tracing::warn!(user_id, course_id, error = %e, "Completion lookup failed");
                    results.insert(user_id, CompletionReport::default());
                }
            }
        }
        results
    }
}

/// Client for the learning platform's REST web services.
///
/// Responses are cached in the injected TTL cache so the repeated lookups a
/// single recommendation request makes (and closely-spaced requests) hit the
/// network once per entry.
#[derive(Clone)]
pub struct LmsClient {
    http_client: HttpClient,
    ws_endpoint: String,
    token: String,
    cache: Arc<ResponseCache>,
    fetch_permits: Arc<Semaphore>,
}

impl LmsClient {
    pub fn new(
        base_url: &str,
        token: String,
        timeout: Duration,
        cache: Arc<ResponseCache>,
        max_concurrent_fetches: usize,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        let ws_endpoint = format!(
            "{}/webservice/rest/server.php",
            base_url.trim_end_matches('/')
        );

        Ok(Self {
            http_client,
            ws_endpoint,
            token,
            cache,
            fetch_permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        })
    }

    /// Makes one web-service call and returns the raw JSON payload.
    ///
    /// The platform reports its own failures inside a 200 response as an
    /// object with `exception`/`errorcode` fields; those surface here as
    /// `AppError::Upstream`.
    async fn call(&self, wsfunction: &str, params: &[(&str, String)]) -> AppResult<Value> {
        let mut form: Vec<(&str, String)> = vec![
            ("wstoken", self.token.clone()),
            ("wsfunction", wsfunction.to_string()),
            ("moodlewsrestformat", "json".to_string()),
        ];
        form.extend(params.iter().map(|(k, v)| (*k, v.clone())));

        tracing::debug!(wsfunction, "Calling learning platform");

        let response = self
            .http_client
            .post(&self.ws_endpoint)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(wsfunction, %status, "Learning platform request failed");
            return Err(AppError::Upstream(format!(
                "{} returned status {}: {}",
                wsfunction, status, body
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid JSON from {}: {}", wsfunction, e)))?;

        if let Some(object) = value.as_object() {
            if object.contains_key("exception") || object.contains_key("errorcode") {
                let message = object
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified platform error")
                    .to_string();
                tracing::error!(wsfunction, error = %message, "Learning platform error payload");
                return Err(AppError::Upstream(message));
            }
        }

        Ok(value)
    }

    /// Cache-first typed fetch
    async fn fetch<T>(
        &self,
        key: CacheKey,
        wsfunction: &str,
        params: &[(&str, String)],
    ) -> AppResult<T>
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        if let Some(cached) = self.cache.get::<T>(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(cached);
        }

        let value = self.call(wsfunction, params).await?;
        let parsed: T = serde_json::from_value(value).map_err(|e| {
            AppError::Upstream(format!("Malformed {} payload: {}", wsfunction, e))
        })?;

        self.cache.set(&key, &parsed).await;
        Ok(parsed)
    }

    /// Tag payloads come back either as a bare list or wrapped in `{tags: [...]}`
    fn parse_tags(value: Value) -> AppResult<Vec<Tag>> {
        let list = match value {
            Value::Array(items) => Value::Array(items),
            Value::Object(mut object) => object
                .remove("tags")
                .ok_or_else(|| AppError::Upstream("Unexpected tag payload shape".to_string()))?,
            other => {
                return Err(AppError::Upstream(format!(
                    "Unexpected tag payload: {}",
                    other
                )))
            }
        };

        serde_json::from_value(list)
            .map_err(|e| AppError::Upstream(format!("Malformed tag payload: {}", e)))
    }

    /// Bulk tag payload: a list of `{id, tags: [name, ...]}` entries
    fn parse_all_course_tags(value: Value) -> AppResult<HashMap<i64, Vec<String>>> {
        #[derive(serde::Deserialize)]
        struct Entry {
            id: i64,
            #[serde(default)]
            tags: Vec<String>,
        }

        let entries: Vec<Entry> = serde_json::from_value(value)
            .map_err(|e| AppError::Upstream(format!("Malformed bulk tag payload: {}", e)))?;

        Ok(entries.into_iter().map(|e| (e.id, e.tags)).collect())
    }
}

#[async_trait]
impl LearningPlatform for LmsClient {
    async fn site_courses(&self) -> AppResult<Vec<Course>> {
        let courses: Vec<Course> = self
            .fetch(CacheKey::SiteCourses, "core_course_get_courses", &[])
            .await?;
        tracing::info!(count = courses.len(), "Fetched site courses");
        Ok(courses)
    }

    async fn user_courses(&self, user_id: i64) -> AppResult<Vec<Course>> {
        self.fetch(
            CacheKey::UserCourses(user_id),
            "core_enrol_get_users_courses",
            &[("userid", user_id.to_string())],
        )
        .await
    }

    async fn course_contents(&self, course_id: i64) -> AppResult<Vec<Section>> {
        self.fetch(
            CacheKey::CourseContents(course_id),
            "core_course_get_contents",
            &[("courseid", course_id.to_string())],
        )
        .await
    }

    async fn enrolled_users(&self, course_id: i64) -> AppResult<Vec<EnrolledUser>> {
        self.fetch(
            CacheKey::EnrolledUsers(course_id),
            "core_enrol_get_enrolled_users",
            &[("courseid", course_id.to_string())],
        )
        .await
    }

    async fn completion_status(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> AppResult<CompletionReport> {
        self.fetch(
            CacheKey::CompletionStatus { user_id, course_id },
            "core_completion_get_activities_completion_status",
            &[
                ("userid", user_id.to_string()),
                ("courseid", course_id.to_string()),
            ],
        )
        .await
    }

    async fn course_tags(&self, course_id: i64) -> AppResult<Vec<Tag>> {
        let key = CacheKey::CourseTags(course_id);
        if let Some(cached) = self.cache.get::<Vec<Tag>>(&key).await {
            return Ok(cached);
        }

        let value = self
            .call(
                "local_fetchtags_get_tags",
                &[("courseid", course_id.to_string())],
            )
            .await?;
        let tags = Self::parse_tags(value)?;

        self.cache.set(&key, &tags).await;
        Ok(tags)
    }

    async fn all_course_tags(&self) -> AppResult<HashMap<i64, Vec<String>>> {
        let key = CacheKey::AllCourseTags;
        if let Some(cached) = self.cache.get::<HashMap<i64, Vec<String>>>(&key).await {
            return Ok(cached);
        }

        let value = self.call("local_coursetags_get_course_tags", &[]).await?;
        let tags = Self::parse_all_course_tags(value)?;
        tracing::info!(course_count = tags.len(), "Fetched tags for all courses");

        self.cache.set(&key, &tags).await;
        Ok(tags)
    }

    async fn enrolled_users_batch(&self, course_ids: &[i64]) -> HashMap<i64, Vec<EnrolledUser>> {
        let mut tasks = Vec::with_capacity(course_ids.len());

        for &course_id in course_ids {
            let client = self.clone();
            let permits = self.fetch_permits.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (course_id, client.enrolled_users(course_id).await)
            }));
        }

        let mut results = HashMap::new();
        for task in tasks {
            match task.await {
                Ok((course_id, Ok(users))) => {
                    results.insert(course_id, users);
                }
                Ok((course_id, Err(e))) => {
                    tracing::warn!(course_id, error = %e, "Enrolled-users lookup failed");
                    results.insert(course_id, Vec::new());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Enrolled-users fetch task panicked");
                }
            }
        }
        results
    }

    async fn completion_status_batch(
        &self,
        user_ids: &[i64],
        course_id: i64,
    ) -> HashMap<i64, CompletionReport> {
        let mut tasks = Vec::with_capacity(user_ids.len());

        for &user_id in user_ids {
            let client = self.clone();
            let permits = self.fetch_permits.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (user_id, client.completion_status(user_id, course_id).await)
            }));
        }

        let mut results = HashMap::new();
        for task in tasks {
            match task.await {
                Ok((user_id, Ok(report))) => {
                    results.insert(user_id, report);
                }
                Ok((user_id, Err(e))) => {
                    tracing::warn!(user_id, course_id, error = %e, "Completion lookup failed");
                    results.insert(user_id, CompletionReport::default());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Completion fetch task panicked");
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tags_bare_list() {
        let value = json!([
            {"id": 1, "name": "rust"},
            {"id": 2, "name": "systems"}
        ]);

        let tags = LmsClient::parse_tags(value).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "rust");
    }

    #[test]
    fn test_parse_tags_wrapped_object() {
        let value = json!({"tags": [{"name": "databases"}]});

        let tags = LmsClient::parse_tags(value).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "databases");
        assert_eq!(tags[0].id, None);
    }

    #[test]
    fn test_parse_tags_rejects_scalar() {
        assert!(LmsClient::parse_tags(json!(42)).is_err());
    }

    #[test]
    fn test_parse_all_course_tags() {
        let value = json!([
            {"id": 3, "tags": ["rust", "systems"]},
            {"id": 4, "tags": []},
            {"id": 5}
        ]);

        let tags = LmsClient::parse_all_course_tags(value).unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[&3], vec!["rust", "systems"]);
        assert!(tags[&4].is_empty());
        assert!(tags[&5].is_empty());
    }
}
