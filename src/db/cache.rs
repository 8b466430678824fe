use std::collections::HashMap;
use std::fmt::Display;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Keys for cached learning-platform responses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    SiteCourses,
    UserCourses(i64),
    CourseContents(i64),
    EnrolledUsers(i64),
    CompletionStatus { user_id: i64, course_id: i64 },
    CourseTags(i64),
    AllCourseTags,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::SiteCourses => write!(f, "courses:site"),
            CacheKey::UserCourses(user_id) => write!(f, "courses:user:{}", user_id),
            CacheKey::CourseContents(course_id) => write!(f, "contents:{}", course_id),
            CacheKey::EnrolledUsers(course_id) => write!(f, "enrolled:{}", course_id),
            CacheKey::CompletionStatus { user_id, course_id } => {
                write!(f, "completion:{}:{}", user_id, course_id)
            }
            CacheKey::CourseTags(course_id) => write!(f, "tags:{}", course_id),
            CacheKey::AllCourseTags => write!(f, "tags:all"),
        }
    }
}

struct CacheEntry {
    stored_at: Instant,
    json: String,
}

/// In-process TTL cache for learning-platform responses.
///
/// Shared across parallel per-course fetches; a miss (or an expired entry)
/// always recomputes. Injected into the platform client rather than held as
/// global state so tests can run against a fresh cache.
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: 1000,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` on a miss, an expired entry, or a payload that no
    /// longer deserializes into the requested type.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entries = self.entries.read().await;
        let entry = entries.get(&key.to_string())?;

        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }

        match serde_json::from_str(&entry.json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache deserialization failed");
                None
            }
        }
    }

    /// Stores a value in the cache
    pub async fn set<T: serde::Serialize>(&self, key: &CacheKey, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache serialization failed");
                return;
            }
        };

        let mut entries = self.entries.write().await;

        // Drop expired entries before growing past the size cap
        if entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                json,
            },
        );
    }

    /// Clears all cached entries
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
        tracing::info!("Response cache cleared");
    }

    /// Number of entries currently held, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display() {
        assert_eq!(CacheKey::SiteCourses.to_string(), "courses:site");
        assert_eq!(CacheKey::UserCourses(7).to_string(), "courses:user:7");
        assert_eq!(
            CacheKey::CompletionStatus {
                user_id: 3,
                course_id: 9
            }
            .to_string(),
            "completion:3:9"
        );
        assert_eq!(CacheKey::AllCourseTags.to_string(), "tags:all");
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let key = CacheKey::CourseTags(5);

        let miss: Option<Vec<String>> = cache.get(&key).await;
        assert_eq!(miss, None);

        cache.set(&key, &vec!["rust".to_string()]).await;
        let hit: Option<Vec<String>> = cache.get(&key).await;
        assert_eq!(hit, Some(vec!["rust".to_string()]));
    }

    #[tokio::test]
    async fn test_cache_expiry() {
        let cache = ResponseCache::new(Duration::from_millis(10));
        let key = CacheKey::SiteCourses;

        cache.set(&key, &vec![1, 2, 3]).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let expired: Option<Vec<i32>> = cache.get(&key).await;
        assert_eq!(expired, None);
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set(&CacheKey::SiteCourses, &1).await;
        cache.set(&CacheKey::AllCourseTags, &2).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
