//! In-memory stand-ins for the stores, the cache and the recommendation engine.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    models::{
        activity::{Activity, CreateActivityRequest},
        itinerary::{ItineraryFields, ItinerarySummary, ScheduleEntry, ScheduleRow},
        personality::Personality,
        recommender::EngineItem,
    },
    services::{
        activities::ActivityStore,
        cache::ResultCache,
        itineraries::{ScheduleStore, ScheduleTx},
        personalities::PersonalityStore,
        recommender::Recommender,
    },
};

pub fn activity(id: i32, name: &str, image_url: &str, country_id: i32) -> Activity {
    Activity {
        id,
        name: name.into(),
        title: format!("{name} tour"),
        price: 10.0 * f64::from(id),
        address: format!("{id} Main Street"),
        image_url: image_url.into(),
        country_id,
    }
}

#[derive(Default)]
pub struct MemoryActivities {
    rows: Mutex<BTreeMap<i32, Activity>>,
    lookups: AtomicUsize,
}

impl MemoryActivities {
    pub fn with(activities: Vec<Activity>) -> Self {
        Self {
            rows: Mutex::new(activities.into_iter().map(|a| (a.id, a)).collect()),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of batched `find_by_ids` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityStore for MemoryActivities {
    async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<Activity>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        // reversed so callers cannot rely on store order
        Ok(rows
            .values()
            .rev()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<Activity>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_country(&self, country_id: i32) -> AppResult<Vec<Activity>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.country_id == country_id)
            .cloned()
            .collect())
    }

    async fn create(&self, req: &CreateActivityRequest) -> AppResult<Activity> {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.keys().next_back().copied().unwrap_or(0) + 1;
        let activity = Activity {
            id,
            name: req.name.trim().to_string(),
            title: req.title.clone(),
            price: req.price,
            address: req.address.clone(),
            image_url: req.image_url.clone(),
            country_id: req.country_id,
        };
        rows.insert(id, activity.clone());
        Ok(activity)
    }

    async fn set_image_url(&self, id: i32, image_url: &str) -> AppResult<bool> {
        match self.rows.lock().unwrap().get_mut(&id) {
            Some(activity) => {
                activity.image_url = image_url.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn insert(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_vec(), Duration::from_secs(60)));
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }
}

fn cache_down() -> AppError {
    AppError::Cache(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(cache_down());
        }
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(cache_down());
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_vec(), ttl));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPersonalities {
    records: Mutex<HashMap<String, Personality>>,
}

impl MemoryPersonalities {
    pub fn get(&self, user_id: &str) -> Option<Personality> {
        self.records.lock().unwrap().get(user_id).copied()
    }
}

#[async_trait]
impl PersonalityStore for MemoryPersonalities {
    async fn upsert(&self, user_id: &str, personality: &Personality) -> AppResult<()> {
        self.records
            .lock()
            .unwrap()
            .insert(user_id.to_string(), *personality);
        Ok(())
    }

    async fn find(&self, user_id: &str) -> AppResult<Option<Personality>> {
        Ok(self.get(user_id))
    }
}

/// Engine double. Every query answers with the same id list; calls are recorded
/// as short strings such as `user:7:10` or `like:7:10`.
#[derive(Default)]
pub struct FakeRecommender {
    ids: Vec<String>,
    calls: Mutex<Vec<String>>,
    labels: Mutex<HashMap<String, Vec<String>>>,
    pub fail: AtomicBool,
}

impl FakeRecommender {
    pub fn returning(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls_to(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn labels_for(&self, user_id: &str) -> Option<Vec<String>> {
        self.labels.lock().unwrap().get(user_id).cloned()
    }

    fn record(&self, call: String) -> AppResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                status: Some(503),
                message: "engine unavailable".into(),
                retryable: true,
                timed_out: false,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Recommender for FakeRecommender {
    async fn recommend_for_user(&self, user_id: &str, limit: usize) -> AppResult<Vec<String>> {
        self.record(format!("user:{user_id}:{limit}"))?;
        Ok(self.ids.clone())
    }

    async fn popular(&self, _limit: usize) -> AppResult<Vec<String>> {
        self.record("popular".into())?;
        Ok(self.ids.clone())
    }

    async fn recommend_in_category(
        &self,
        user_id: &str,
        category: &str,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        self.record(format!("category:{user_id}:{category}:{limit}"))?;
        Ok(self.ids.clone())
    }

    async fn add_user(&self, user_id: &str) -> AppResult<()> {
        self.record(format!("add_user:{user_id}"))
    }

    async fn add_item(&self, item: &EngineItem) -> AppResult<()> {
        self.record(format!("add_item:{}", item.item_id))
    }

    async fn update_user_labels(&self, user_id: &str, labels: Vec<String>) -> AppResult<()> {
        self.record(format!("labels:{user_id}"))?;
        self.labels.lock().unwrap().insert(user_id.to_string(), labels);
        Ok(())
    }

    async fn add_like(&self, user_id: &str, item_id: &str) -> AppResult<()> {
        self.record(format!("like:{user_id}:{item_id}"))
    }

    async fn remove_feedback(&self, user_id: &str, item_id: &str) -> AppResult<()> {
        self.record(format!("unlike:{user_id}:{item_id}"))
    }
}

#[derive(Clone, Default)]
struct Tables {
    next_id: i32,
    itineraries: BTreeMap<i32, ItinerarySummary>,
    entries: Vec<(i32, ScheduleEntry)>,
}

#[derive(Default)]
struct ScheduleInner {
    tables: Mutex<Tables>,
    activities: BTreeMap<i32, Activity>,
    transactions: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Itinerary store whose transactions work on a private copy of the tables and
/// publish it on commit. Entries referencing unknown activities fail like a
/// foreign key would.
#[derive(Clone, Default)]
pub struct MemorySchedule {
    inner: Arc<ScheduleInner>,
}

impl MemorySchedule {
    pub fn with_activities(activities: Vec<Activity>) -> Self {
        Self {
            inner: Arc::new(ScheduleInner {
                activities: activities.into_iter().map(|a| (a.id, a)).collect(),
                ..Default::default()
            }),
        }
    }

    pub fn entry_count(&self, itinerary_id: i32) -> usize {
        let tables = self.inner.tables.lock().unwrap();
        tables.entries.iter().filter(|(id, _)| *id == itinerary_id).count()
    }

    pub fn total_entries(&self) -> usize {
        self.inner.tables.lock().unwrap().entries.len()
    }

    pub fn itinerary_count(&self) -> usize {
        self.inner.tables.lock().unwrap().itineraries.len()
    }

    pub fn transactions_started(&self) -> usize {
        self.inner.transactions.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduleStore for MemorySchedule {
    async fn begin(&self) -> AppResult<Box<dyn ScheduleTx>> {
        self.inner.transactions.fetch_add(1, Ordering::SeqCst);
        let working = self.inner.tables.lock().unwrap().clone();
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            working,
        }))
    }

    async fn schedule_rows(&self, itinerary_id: i32) -> AppResult<Vec<ScheduleRow>> {
        let tables = self.inner.tables.lock().unwrap();
        let Some(itinerary) = tables.itineraries.get(&itinerary_id) else {
            return Ok(Vec::new());
        };
        Ok(tables
            .entries
            .iter()
            .filter(|(id, _)| *id == itinerary_id)
            .filter_map(|(_, entry)| {
                let activity = self.inner.activities.get(&entry.activity_id)?.clone();
                Some(ScheduleRow {
                    day_number: entry.day_number,
                    start_time: entry.start_time,
                    end_time: entry.end_time,
                    order_in_day: entry.order_in_day,
                    start_date: itinerary.start_date,
                    activity,
                })
            })
            .collect())
    }

    async fn find(&self, itinerary_id: i32) -> AppResult<Option<ItinerarySummary>> {
        let tables = self.inner.tables.lock().unwrap();
        Ok(tables.itineraries.get(&itinerary_id).cloned())
    }

    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<ItinerarySummary>> {
        let tables = self.inner.tables.lock().unwrap();
        Ok(tables
            .itineraries
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, itinerary_id: i32) -> AppResult<bool> {
        let mut tables = self.inner.tables.lock().unwrap();
        let existed = tables.itineraries.remove(&itinerary_id).is_some();
        tables.entries.retain(|(id, _)| *id != itinerary_id);
        Ok(existed)
    }
}

struct MemoryTx {
    inner: Arc<ScheduleInner>,
    working: Tables,
}

#[async_trait]
impl ScheduleTx for MemoryTx {
    async fn insert_itinerary(&mut self, user_id: i32, fields: &ItineraryFields) -> AppResult<i32> {
        self.working.next_id += 1;
        let id = self.working.next_id;
        self.working.itineraries.insert(
            id,
            ItinerarySummary {
                id,
                user_id,
                title: fields.title.trim().to_string(),
                description: fields.description.clone(),
                start_date: fields.start_date,
                end_date: fields.end_date,
            },
        );
        Ok(id)
    }

    async fn update_itinerary(
        &mut self,
        itinerary_id: i32,
        fields: &ItineraryFields,
    ) -> AppResult<Option<i32>> {
        let Some(row) = self.working.itineraries.get_mut(&itinerary_id) else {
            return Ok(None);
        };
        row.title = fields.title.trim().to_string();
        row.description = fields.description.clone();
        row.start_date = fields.start_date;
        row.end_date = fields.end_date;
        Ok(Some(row.user_id))
    }

    async fn delete_entries(&mut self, itinerary_id: i32) -> AppResult<u64> {
        let before = self.working.entries.len();
        self.working.entries.retain(|(id, _)| *id != itinerary_id);
        Ok((before - self.working.entries.len()) as u64)
    }

    async fn insert_entry(&mut self, itinerary_id: i32, entry: &ScheduleEntry) -> AppResult<()> {
        if !self.inner.activities.contains_key(&entry.activity_id) {
            return Err(AppError::not_found(format!(
                "activity {} does not exist",
                entry.activity_id
            )));
        }
        self.working.entries.push((itinerary_id, entry.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx { inner, working } = *self;
        *inner.tables.lock().unwrap() = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
