use async_trait::async_trait;
use sqlx::PgPool;

use crate::{error::AppResult, models::personality::Personality};

/// Locally stored personality records, keyed by recommender user id.
#[async_trait]
pub trait PersonalityStore: Send + Sync {
    /// Inserts or replaces the user's record.
    async fn upsert(&self, user_id: &str, personality: &Personality) -> AppResult<()>;
    async fn find(&self, user_id: &str) -> AppResult<Option<Personality>>;
}

#[derive(Clone)]
pub struct PgPersonalityStore {
    pool: PgPool,
}

impl PgPersonalityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonalityStore for PgPersonalityStore {
    async fn upsert(&self, user_id: &str, personality: &Personality) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO personalities
                 (user_id, openness, conscientiousness, extraversion, agreeableness, neuroticism)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id) DO UPDATE SET
                 openness = EXCLUDED.openness,
                 conscientiousness = EXCLUDED.conscientiousness,
                 extraversion = EXCLUDED.extraversion,
                 agreeableness = EXCLUDED.agreeableness,
                 neuroticism = EXCLUDED.neuroticism,
                 updated_at = NOW()",
        )
        .bind(user_id)
        .bind(personality.openness)
        .bind(personality.conscientiousness)
        .bind(personality.extraversion)
        .bind(personality.agreeableness)
        .bind(personality.neuroticism)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, user_id: &str) -> AppResult<Option<Personality>> {
        let personality = sqlx::query_as::<_, Personality>(
            "SELECT openness, conscientiousness, extraversion, agreeableness, neuroticism
             FROM personalities WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(personality)
    }
}
