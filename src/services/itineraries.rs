use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};

use crate::{
    error::{is_foreign_key_violation, AppError, AppResult},
    models::itinerary::{
        Itinerary, ItineraryDay, ItineraryFields, ItinerarySummary, ItineraryWithDays,
        ScheduleEntry, ScheduleRow, ScheduledActivity,
    },
    services::metrics,
};

/// Itinerary persistence. Writes go through a [`ScheduleTx`] so that an itinerary row
/// and its schedule entries become visible together or not at all.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn ScheduleTx>>;
    /// Entries joined with their activity, in schedule order.
    async fn schedule_rows(&self, itinerary_id: i32) -> AppResult<Vec<ScheduleRow>>;
    async fn find(&self, itinerary_id: i32) -> AppResult<Option<ItinerarySummary>>;
    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<ItinerarySummary>>;
    /// Returns false when nothing was deleted.
    async fn delete(&self, itinerary_id: i32) -> AppResult<bool>;
}

/// An open write transaction. Dropping it without `commit` discards every write.
#[async_trait]
pub trait ScheduleTx: Send {
    async fn insert_itinerary(&mut self, user_id: i32, fields: &ItineraryFields) -> AppResult<i32>;
    /// Returns the owning user when the itinerary exists.
    async fn update_itinerary(
        &mut self,
        itinerary_id: i32,
        fields: &ItineraryFields,
    ) -> AppResult<Option<i32>>;
    async fn delete_entries(&mut self, itinerary_id: i32) -> AppResult<u64>;
    /// Fails with `NotFound` when the activity does not exist.
    async fn insert_entry(&mut self, itinerary_id: i32, entry: &ScheduleEntry) -> AppResult<()>;
    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PgScheduleTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn begin(&self) -> AppResult<Box<dyn ScheduleTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgScheduleTx { tx }))
    }

    async fn schedule_rows(&self, itinerary_id: i32) -> AppResult<Vec<ScheduleRow>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT ia.day_number, ia.start_time, ia.end_time, ia.order_in_day, i.start_date,
                    a.id, a.name, a.title, a.price, a.address, a.image_url, a.country_id
             FROM itinerary_activities ia
             JOIN itineraries i ON i.id = ia.itinerary_id
             JOIN activities a ON a.id = ia.activity_id
             WHERE ia.itinerary_id = $1
             ORDER BY ia.day_number, ia.order_in_day NULLS LAST, ia.start_time NULLS LAST, ia.id",
        )
        .bind(itinerary_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find(&self, itinerary_id: i32) -> AppResult<Option<ItinerarySummary>> {
        let itinerary = sqlx::query_as::<_, ItinerarySummary>(
            "SELECT id, user_id, title, description, start_date, end_date
             FROM itineraries WHERE id = $1",
        )
        .bind(itinerary_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(itinerary)
    }

    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<ItinerarySummary>> {
        let itineraries = sqlx::query_as::<_, ItinerarySummary>(
            "SELECT id, user_id, title, description, start_date, end_date
             FROM itineraries WHERE user_id = $1
             ORDER BY start_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(itineraries)
    }

    async fn delete(&self, itinerary_id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM itineraries WHERE id = $1")
            .bind(itinerary_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScheduleTx for PgScheduleTx {
    async fn insert_itinerary(&mut self, user_id: i32, fields: &ItineraryFields) -> AppResult<i32> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO itineraries (user_id, title, description, start_date, end_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(user_id)
        .bind(fields.title.trim())
        .bind(&fields.description)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn update_itinerary(
        &mut self,
        itinerary_id: i32,
        fields: &ItineraryFields,
    ) -> AppResult<Option<i32>> {
        let owner: Option<i32> = sqlx::query_scalar(
            "UPDATE itineraries
             SET title = $1, description = $2, start_date = $3, end_date = $4, updated_at = NOW()
             WHERE id = $5
             RETURNING user_id",
        )
        .bind(fields.title.trim())
        .bind(&fields.description)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(itinerary_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(owner)
    }

    async fn delete_entries(&mut self, itinerary_id: i32) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM itinerary_activities WHERE itinerary_id = $1")
            .bind(itinerary_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_entry(&mut self, itinerary_id: i32, entry: &ScheduleEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO itinerary_activities
                 (itinerary_id, activity_id, day_number, start_time, end_time, order_in_day)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(itinerary_id)
        .bind(entry.activity_id)
        .bind(entry.day_number)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.order_in_day)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::not_found(format!("activity {} does not exist", entry.activity_id))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Creates and replaces itineraries atomically and serves the day-grouped view.
pub struct ItineraryScheduler {
    store: Arc<dyn ScheduleStore>,
}

impl ItineraryScheduler {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        user_id: i32,
        fields: ItineraryFields,
        entries: Vec<ScheduleEntry>,
    ) -> AppResult<Itinerary> {
        fields.validate(&entries).map_err(AppError::Validation)?;

        let mut tx = self.store.begin().await?;
        let written = write_new(tx.as_mut(), user_id, &fields, &entries).await;
        let id = finish(tx, "create", written).await?;

        info!(
            "Created itinerary {} for user {} with {} activities",
            id,
            user_id,
            entries.len()
        );
        Ok(Itinerary::assemble(id, user_id, fields, entries))
    }

    /// Replaces the scalar fields and the whole schedule. Entries not in `entries`
    /// are gone afterwards.
    pub async fn modify(
        &self,
        itinerary_id: i32,
        fields: ItineraryFields,
        entries: Vec<ScheduleEntry>,
    ) -> AppResult<Itinerary> {
        fields.validate(&entries).map_err(AppError::Validation)?;

        let mut tx = self.store.begin().await?;
        let written = replace_schedule(tx.as_mut(), itinerary_id, &fields, &entries).await;
        let user_id = finish(tx, "modify", written).await?;

        info!(
            "Replaced schedule of itinerary {} with {} activities",
            itinerary_id,
            entries.len()
        );
        Ok(Itinerary::assemble(itinerary_id, user_id, fields, entries))
    }

    /// Day-grouped schedule. Unknown itineraries yield an empty list.
    pub async fn schedule(&self, itinerary_id: i32) -> AppResult<Vec<ItineraryDay>> {
        let rows = self.store.schedule_rows(itinerary_id).await?;
        Ok(group_by_day(rows))
    }

    pub async fn get(&self, itinerary_id: i32) -> AppResult<ItineraryWithDays> {
        let itinerary = self
            .store
            .find(itinerary_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("itinerary {itinerary_id} not found")))?;
        let days = self.schedule(itinerary_id).await?;
        Ok(ItineraryWithDays { itinerary, days })
    }

    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<ItinerarySummary>> {
        self.store.list_for_user(user_id).await
    }

    pub async fn delete(&self, itinerary_id: i32) -> AppResult<()> {
        if !self.store.delete(itinerary_id).await? {
            return Err(AppError::not_found(format!(
                "itinerary {itinerary_id} not found"
            )));
        }
        info!("Deleted itinerary {}", itinerary_id);
        Ok(())
    }
}

async fn write_new(
    tx: &mut dyn ScheduleTx,
    user_id: i32,
    fields: &ItineraryFields,
    entries: &[ScheduleEntry],
) -> AppResult<i32> {
    let id = tx.insert_itinerary(user_id, fields).await?;
    insert_entries(tx, id, entries).await?;
    Ok(id)
}

async fn replace_schedule(
    tx: &mut dyn ScheduleTx,
    itinerary_id: i32,
    fields: &ItineraryFields,
    entries: &[ScheduleEntry],
) -> AppResult<i32> {
    let user_id = tx
        .update_itinerary(itinerary_id, fields)
        .await?
        .ok_or_else(|| AppError::not_found(format!("itinerary {itinerary_id} not found")))?;
    let removed = tx.delete_entries(itinerary_id).await?;
    debug!(
        "Itinerary {}: removed {} entries, inserting {}",
        itinerary_id,
        removed,
        entries.len()
    );
    insert_entries(tx, itinerary_id, entries).await?;
    Ok(user_id)
}

async fn insert_entries(
    tx: &mut dyn ScheduleTx,
    itinerary_id: i32,
    entries: &[ScheduleEntry],
) -> AppResult<()> {
    for entry in entries {
        tx.insert_entry(itinerary_id, entry).await?;
    }
    Ok(())
}

/// Commits on success, rolls back on failure. The caller's error wins over a
/// failed rollback.
async fn finish<T>(
    tx: Box<dyn ScheduleTx>,
    operation: &'static str,
    written: AppResult<T>,
) -> AppResult<T> {
    match written {
        Ok(value) => {
            if let Err(e) = tx.commit().await {
                metrics::record_itinerary_write(operation, false);
                return Err(e);
            }
            metrics::record_itinerary_write(operation, true);
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback after failed {} did not complete: {}", operation, rollback_err);
            }
            metrics::record_itinerary_write(operation, false);
            Err(e)
        }
    }
}

/// Buckets rows by day (ascending), ordering each day by `order_in_day` then
/// `start_time`, unset values last. Ties keep input order.
pub fn group_by_day(rows: Vec<ScheduleRow>) -> Vec<ItineraryDay> {
    let mut days: BTreeMap<i32, ItineraryDay> = BTreeMap::new();
    for row in rows {
        let day = days.entry(row.day_number).or_insert_with(|| ItineraryDay {
            day_number: row.day_number,
            date: day_date(row.start_date, row.day_number),
            activities: Vec::new(),
        });
        day.activities.push(ScheduledActivity {
            activity: row.activity,
            start_time: row.start_time,
            end_time: row.end_time,
            order_in_day: row.order_in_day,
        });
    }

    let mut days: Vec<ItineraryDay> = days.into_values().collect();
    for day in &mut days {
        day.activities.sort_by(|a, b| {
            nulls_last(&a.order_in_day, &b.order_in_day)
                .then_with(|| nulls_last(&a.start_time, &b.start_time))
        });
    }
    days
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Calendar date of a 1-based trip day.
fn day_date(start_date: NaiveDate, day_number: i32) -> NaiveDate {
    let offset = u64::try_from(day_number.saturating_sub(1)).unwrap_or(0);
    start_date
        .checked_add_days(Days::new(offset))
        .unwrap_or(NaiveDate::MAX)
}
