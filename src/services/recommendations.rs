use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    models::{
        activity::Activity,
        personality::{Personality, UserPersonality},
        recommender::EngineItem,
    },
    services::{
        activities::ActivityStore, cache::ResultCache, metrics, personalities::PersonalityStore,
        recommender::Recommender, storage::ObjectStorage,
    },
};

pub const MAX_RECOMMENDATIONS: usize = 50;

pub fn popular_cache_key(limit: usize) -> String {
    format!("popular_activities:{limit}")
}

/// Answers recommendation queries by enriching engine identifiers with catalog rows.
pub struct RecommendationService {
    recommender: Arc<dyn Recommender>,
    activities: Arc<dyn ActivityStore>,
    cache: Arc<dyn ResultCache>,
    personalities: Arc<dyn PersonalityStore>,
    storage: ObjectStorage,
    popular_ttl: Duration,
}

impl RecommendationService {
    pub fn new(
        recommender: Arc<dyn Recommender>,
        activities: Arc<dyn ActivityStore>,
        cache: Arc<dyn ResultCache>,
        personalities: Arc<dyn PersonalityStore>,
        storage: ObjectStorage,
        popular_ttl: Duration,
    ) -> Self {
        Self {
            recommender,
            activities,
            cache,
            personalities,
            storage,
            popular_ttl,
        }
    }

    /// Popular activities, cache-aside. A cache hit skips the engine and the catalog.
    pub async fn popular(&self, limit: usize) -> AppResult<Vec<Activity>> {
        check_limit(limit)?;
        let key = popular_cache_key(limit);
        if let Some(activities) = self.cached(&key).await {
            return Ok(activities);
        }

        let ids = self.recommender.popular(limit).await?;
        let activities = self.enrich(&ids).await?;

        match serde_json::to_vec(&activities) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(&key, &bytes, self.popular_ttl).await {
                    metrics::record_cache("error");
                    warn!("Failed to cache {}: {}", key, e);
                }
            }
            Err(e) => warn!("Failed to serialize {}: {}", key, e),
        }
        Ok(activities)
    }

    /// Personalized picks in the engine's ranking order. Never cached.
    pub async fn personalized(&self, user_id: &str, limit: usize) -> AppResult<Vec<Activity>> {
        let user_id = require_user(user_id)?;
        check_limit(limit)?;
        let ids = self.recommender.recommend_for_user(user_id, limit).await?;
        self.enrich(&ids).await
    }

    /// Personalized picks restricted to one country (the engine's item category).
    pub async fn personalized_in_country(
        &self,
        user_id: &str,
        country_id: i32,
        limit: usize,
    ) -> AppResult<Vec<Activity>> {
        let user_id = require_user(user_id)?;
        check_limit(limit)?;
        let ids = self
            .recommender
            .recommend_in_category(user_id, &country_id.to_string(), limit)
            .await?;
        self.enrich(&ids).await
    }

    /// Like pushes positive feedback; unlike removes it. Engine failures propagate.
    pub async fn record_preference(
        &self,
        user_id: &str,
        activity_id: i32,
        liked: bool,
    ) -> AppResult<()> {
        let user_id = require_user(user_id)?;
        let item_id = activity_id.to_string();
        if liked {
            self.recommender.add_like(user_id, &item_id).await
        } else {
            self.recommender.remove_feedback(user_id, &item_id).await
        }
    }

    pub async fn register_user(&self, user_id: &str) -> AppResult<()> {
        let user_id = require_user(user_id)?;
        self.recommender.add_user(user_id).await
    }

    /// Stores the record, then pushes it to the engine as labels. The stored record
    /// stays when the push fails.
    pub async fn update_personality(
        &self,
        user_id: &str,
        personality: &Personality,
    ) -> AppResult<()> {
        let user_id = require_user(user_id)?;
        personality.validate().map_err(AppError::Validation)?;
        self.personalities.upsert(user_id, personality).await?;
        self.recommender
            .update_user_labels(user_id, personality.labels())
            .await
    }

    pub async fn personality(&self, user_id: &str) -> AppResult<UserPersonality> {
        let user_id = require_user(user_id)?;
        let personality = self
            .personalities
            .find(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no personality for user {user_id}")))?;
        Ok(UserPersonality {
            user_id: user_id.to_string(),
            personality,
        })
    }

    pub async fn publish_activity(&self, activity: &Activity) -> AppResult<()> {
        self.recommender.add_item(&EngineItem::from(activity)).await
    }

    pub fn display_url(&self, image_ref: &str) -> String {
        self.storage.display_url(image_ref)
    }

    pub fn with_display_url(&self, mut activity: Activity) -> Activity {
        activity.image_url = self.display_url(&activity.image_url);
        activity
    }

    async fn cached(&self, key: &str) -> Option<Vec<Activity>> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(activities) => {
                    metrics::record_cache("hit");
                    Some(activities)
                }
                Err(e) => {
                    metrics::record_cache("miss");
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => {
                metrics::record_cache("miss");
                None
            }
            Err(e) => {
                metrics::record_cache("error");
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// One batched catalog lookup; output keeps the engine's order. A repeated id
    /// keeps its first position only.
    async fn enrich(&self, ids: &[String]) -> AppResult<Vec<Activity>> {
        let mut seen = HashSet::new();
        let mut parsed: Vec<i32> = Vec::with_capacity(ids.len());
        for raw in ids {
            match raw.trim().parse::<i32>() {
                Ok(id) if seen.insert(id) => parsed.push(id),
                Ok(id) => debug!("Dropping repeated recommendation id {}", id),
                Err(_) => warn!("Ignoring non-numeric recommendation id {:?}", raw),
            }
        }
        if parsed.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<i32, Activity> = self
            .activities
            .find_by_ids(&parsed)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let activities: Vec<Activity> = parsed
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|a| self.with_display_url(a))
            .collect();

        if activities.len() < parsed.len() {
            debug!(
                "{} of {} recommended ids had no catalog entry",
                parsed.len() - activities.len(),
                parsed.len()
            );
        }
        Ok(activities)
    }
}

fn require_user(user_id: &str) -> AppResult<&str> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::validation("user_id is required"));
    }
    Ok(user_id)
}

fn check_limit(limit: usize) -> AppResult<()> {
    if limit == 0 || limit > MAX_RECOMMENDATIONS {
        return Err(AppError::validation(format!(
            "limit must be between 1 and {MAX_RECOMMENDATIONS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{
        activity, FakeRecommender, MemoryActivities, MemoryCache, MemoryPersonalities,
    };

    struct Fixture {
        service: RecommendationService,
        recommender: Arc<FakeRecommender>,
        activities: Arc<MemoryActivities>,
        cache: Arc<MemoryCache>,
        personalities: Arc<MemoryPersonalities>,
    }

    fn fixture(ids: &[&str]) -> Fixture {
        let recommender = Arc::new(FakeRecommender::returning(ids));
        let activities = Arc::new(MemoryActivities::with(vec![
            activity(1, "Senso-ji", "asakusa.png", 81),
            activity(2, "teamLab", "teamlab.png", 81),
            activity(3, "Skytree", "skytree.png", 81),
            activity(4, "Louvre", "", 33),
        ]));
        let cache = Arc::new(MemoryCache::default());
        let personalities = Arc::new(MemoryPersonalities::default());
        let service = RecommendationService::new(
            recommender.clone(),
            activities.clone(),
            cache.clone(),
            personalities.clone(),
            ObjectStorage::new("http://minio:9000", "media"),
            Duration::from_secs(300),
        );
        Fixture {
            service,
            recommender,
            activities,
            cache,
            personalities,
        }
    }

    fn ids_of(activities: &[Activity]) -> Vec<i32> {
        activities.iter().map(|a| a.id).collect()
    }

    #[tokio::test]
    async fn popular_keeps_engine_order_and_rewrites_image_urls() {
        let f = fixture(&["3", "1", "2"]);
        let popular = f.service.popular(10).await.unwrap();

        assert_eq!(ids_of(&popular), vec![3, 1, 2]);
        assert_eq!(popular[0].image_url, "http://minio:9000/media/skytree.png");
        assert_eq!(popular[1].image_url, "http://minio:9000/media/asakusa.png");
        assert_eq!(f.activities.lookups(), 1);
    }

    #[tokio::test]
    async fn popular_is_served_from_cache_within_ttl() {
        let f = fixture(&["3", "1", "2"]);
        let first = f.service.popular(10).await.unwrap();
        let second = f.service.popular(10).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.recommender.calls_to("popular"), 1);
        assert_eq!(f.activities.lookups(), 1);
        assert_eq!(f.cache.ttl_of(&popular_cache_key(10)), Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn different_limits_use_different_cache_entries() {
        let f = fixture(&["3", "1", "2"]);
        f.service.popular(10).await.unwrap();
        f.service.popular(5).await.unwrap();
        assert_eq!(f.recommender.calls_to("popular"), 2);
    }

    #[tokio::test]
    async fn cache_failures_fall_back_to_fresh_results() {
        let f = fixture(&["2"]);
        f.cache.fail_reads.store(true, Ordering::SeqCst);
        f.cache.fail_writes.store(true, Ordering::SeqCst);

        let popular = f.service.popular(10).await.unwrap();
        assert_eq!(ids_of(&popular), vec![2]);

        let again = f.service.popular(10).await.unwrap();
        assert_eq!(again, popular);
        assert_eq!(f.recommender.calls_to("popular"), 2);
    }

    #[tokio::test]
    async fn corrupt_cache_entries_are_recomputed_and_overwritten() {
        let f = fixture(&["1"]);
        f.cache.insert(&popular_cache_key(10), b"not json");

        let popular = f.service.popular(10).await.unwrap();
        assert_eq!(ids_of(&popular), vec![1]);
        assert_eq!(f.recommender.calls_to("popular"), 1);

        let cached: Vec<Activity> =
            serde_json::from_slice(&f.cache.raw(&popular_cache_key(10)).unwrap()).unwrap();
        assert_eq!(cached, popular);
    }

    #[tokio::test]
    async fn engine_failures_surface_and_nothing_is_cached() {
        let f = fixture(&["1"]);
        f.recommender.fail.store(true, Ordering::SeqCst);

        let err = f.service.popular(10).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));
        assert!(f.cache.raw(&popular_cache_key(10)).is_none());
        assert_eq!(f.activities.lookups(), 0);
    }

    #[tokio::test]
    async fn personalized_skips_unknown_and_malformed_ids() {
        let f = fixture(&["4", "99", "abc", "2"]);
        let picks = f.service.personalized("7", 10).await.unwrap();

        assert_eq!(ids_of(&picks), vec![4, 2]);
        assert_eq!(picks[0].image_url, "");
        assert_eq!(f.recommender.calls_to("user:7:10"), 1);
        assert_eq!(f.activities.lookups(), 1);
    }

    #[tokio::test]
    async fn personalized_results_are_not_cached() {
        let f = fixture(&["1"]);
        f.service.personalized("7", 10).await.unwrap();
        f.service.personalized("7", 10).await.unwrap();
        assert_eq!(f.recommender.calls_to("user:7:10"), 2);
    }

    #[tokio::test]
    async fn country_scope_is_passed_as_engine_category() {
        let f = fixture(&["3"]);
        let picks = f.service.personalized_in_country("7", 81, 10).await.unwrap();
        assert_eq!(ids_of(&picks), vec![3]);
        assert_eq!(f.recommender.calls_to("category:7:81:10"), 1);
    }

    #[tokio::test]
    async fn blank_users_are_rejected_before_calling_the_engine() {
        let f = fixture(&["3"]);
        assert!(matches!(
            f.service.personalized_in_country("  ", 81, 10).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.service.personalized("", 10).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(f.recommender.total_calls(), 0);
    }

    #[tokio::test]
    async fn limits_outside_range_are_rejected() {
        let f = fixture(&["3"]);
        assert!(f.service.popular(0).await.is_err());
        assert!(f.service.personalized("7", MAX_RECOMMENDATIONS + 1).await.is_err());
        assert_eq!(f.recommender.total_calls(), 0);
    }

    #[tokio::test]
    async fn empty_recommendations_skip_the_catalog() {
        let f = fixture(&[]);
        assert!(f.service.popular(10).await.unwrap().is_empty());
        assert_eq!(f.activities.lookups(), 0);
    }

    #[tokio::test]
    async fn preferences_map_to_like_and_unlike() {
        let f = fixture(&[]);
        f.service.record_preference("7", 10, true).await.unwrap();
        f.service.record_preference("7", 10, false).await.unwrap();
        assert_eq!(f.recommender.calls_to("like:7:10"), 1);
        assert_eq!(f.recommender.calls_to("unlike:7:10"), 1);
    }

    #[tokio::test]
    async fn preference_failures_are_not_swallowed() {
        let f = fixture(&[]);
        f.recommender.fail.store(true, Ordering::SeqCst);
        assert!(f.service.record_preference("7", 10, true).await.is_err());
        assert!(f.service.record_preference("7", 10, false).await.is_err());
    }

    #[tokio::test]
    async fn personality_is_sent_as_trait_labels() {
        let f = fixture(&[]);
        let personality = Personality {
            openness: 0.5,
            conscientiousness: 0.25,
            extraversion: 1.0,
            agreeableness: 0.0,
            neuroticism: 0.75,
        };
        f.service.update_personality("7", &personality).await.unwrap();
        assert_eq!(
            f.recommender.labels_for("7"),
            Some(personality.labels())
        );

        let invalid = Personality {
            openness: 2.0,
            ..personality
        };
        assert!(matches!(
            f.service.update_personality("7", &invalid).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(f.service.personality("7").await.unwrap().personality, personality);
    }

    #[tokio::test]
    async fn personality_is_stored_before_the_engine_push() {
        let f = fixture(&[]);
        f.recommender.fail.store(true, Ordering::SeqCst);
        let personality = Personality {
            openness: 0.1,
            conscientiousness: 0.2,
            extraversion: 0.3,
            agreeableness: 0.4,
            neuroticism: 0.5,
        };

        assert!(f.service.update_personality(" 7 ", &personality).await.is_err());
        assert_eq!(f.personalities.get("7"), Some(personality));

        let stored = f.service.personality("7").await.unwrap();
        assert_eq!(stored.user_id, "7");
        assert_eq!(stored.personality, personality);
    }

    #[tokio::test]
    async fn missing_personalities_are_not_found() {
        let f = fixture(&[]);
        assert!(matches!(
            f.service.personality("8").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn repeated_ids_keep_their_first_position() {
        let f = fixture(&["2", "1", "2", "3", "1"]);
        let picks = f.service.personalized("7", 10).await.unwrap();
        assert_eq!(ids_of(&picks), vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn publishing_sends_the_activity_as_an_item() {
        let f = fixture(&[]);
        let louvre = activity(4, "Louvre", "", 33);
        f.service.publish_activity(&louvre).await.unwrap();
        assert_eq!(f.recommender.calls_to("add_item:4"), 1);
    }
}
