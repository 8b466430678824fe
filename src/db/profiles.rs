use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::AppResult;

/// Read-only access to a user's stated interests.
///
/// Absence of a profile, or of the interests field, is a valid "no interest
/// signal" outcome and never an error.
#[async_trait]
pub trait InterestSource: Send + Sync {
    async fn interests(&self, user_id: i64) -> AppResult<Vec<String>>;
}

/// User profile store backed by Postgres.
///
/// Profiles are owned by another system; this store reads the single
/// `preferences` document per user and extracts `preferences.interests`.
pub struct ProfileStore {
    pool: PgPool,
}

impl ProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a store with a lazily-connected pool.
    ///
    /// The first query establishes the connection, so a missing or
    /// unreachable database degrades to "no interests" at request time
    /// instead of failing startup.
    pub fn connect_lazy(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl InterestSource for ProfileStore {
    async fn interests(&self, user_id: i64) -> AppResult<Vec<String>> {
        let row = sqlx::query(
            "SELECT preferences::text AS preferences \
             FROM user_profiles WHERE platform_user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            tracing::debug!(user_id, "No profile document for user");
            return Ok(Vec::new());
        };

        let preferences: Option<String> = row.try_get("preferences")?;
        let interests = preferences
            .as_deref()
            .and_then(|json| serde_json::from_str::<serde_json::Value>(json).ok())
            .and_then(|prefs| {
                prefs.get("interests").and_then(|list| {
                    list.as_array().map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str())
                            .map(|s| s.to_string())
                            .collect::<Vec<_>>()
                    })
                })
            })
            .unwrap_or_default();

        tracing::info!(
            user_id,
            interest_count = interests.len(),
            "Fetched user interests"
        );

        Ok(interests)
    }
}
