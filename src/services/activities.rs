use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::{is_foreign_key_violation, AppError, AppResult},
    models::activity::{Activity, CreateActivityRequest},
};

const ACTIVITY_COLUMNS: &str = "id, name, title, price, address, image_url, country_id";

/// Persisted activity catalog.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Batched lookup. Row order is unspecified; callers reorder as needed.
    async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Activity>>;
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Activity>>;
    async fn list_by_country(&self, country_id: i32) -> AppResult<Vec<Activity>>;
    async fn create(&self, req: &CreateActivityRequest) -> AppResult<Activity>;
    /// Returns false when no activity has this id.
    async fn set_image_url(&self, id: i32, image_url: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgActivityStore {
    pool: PgPool,
}

impl PgActivityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> AppResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Activity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let activities = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Activity>> {
        let activity = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(activity)
    }

    async fn list_by_country(&self, country_id: i32) -> AppResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE country_id = $1 ORDER BY name"
        ))
        .bind(country_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(activities)
    }

    async fn create(&self, req: &CreateActivityRequest) -> AppResult<Activity> {
        let activity = sqlx::query_as::<_, Activity>(&format!(
            "INSERT INTO activities (name, title, price, address, image_url, country_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ACTIVITY_COLUMNS}"
        ))
        .bind(req.name.trim())
        .bind(&req.title)
        .bind(req.price)
        .bind(&req.address)
        .bind(&req.image_url)
        .bind(req.country_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::not_found(format!("country {} does not exist", req.country_id))
            } else {
                e.into()
            }
        })?;
        Ok(activity)
    }

    async fn set_image_url(&self, id: i32, image_url: &str) -> AppResult<bool> {
        let result = sqlx::query("UPDATE activities SET image_url = $1 WHERE id = $2")
            .bind(image_url)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
