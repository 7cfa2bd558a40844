use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
};
use redis::Client as RedisClient;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripplanner_api::{
    config::Config,
    db, routes,
    services::{
        activities::PgActivityStore,
        cache::RedisCache,
        itineraries::{ItineraryScheduler, PgScheduleStore},
        personalities::PgPersonalityStore,
        recommendations::RecommendationService,
        recommender::GorseClient,
        storage::ObjectStorage,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    let recommender = GorseClient::new(&config.recommender_url, config.recommender_timeout())?;
    info!(
        "Recommendation engine at {} (timeout {}s)",
        config.recommender_url, config.recommender_timeout_secs
    );

    let activities = Arc::new(PgActivityStore::new(pool.clone()));
    let recommendations = RecommendationService::new(
        Arc::new(recommender),
        activities.clone(),
        Arc::new(RedisCache::new(redis_conn)),
        Arc::new(PgPersonalityStore::new(pool.clone())),
        ObjectStorage::new(&config.storage_endpoint, &config.storage_bucket),
        config.popular_cache_ttl(),
    );

    let state = AppState {
        db: pool.clone(),
        config: config.clone(),
        activities,
        scheduler: Arc::new(ItineraryScheduler::new(Arc::new(PgScheduleStore::new(pool)))),
        recommendations: Arc::new(recommendations),
    };

    // Allow the app base URL; localhost is always allowed for development.
    let base_url = config.app_base_url.clone();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base_url
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE, header::ACCEPT]))
        .allow_origin(cors_origin);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr = format!("{}:{}", config.host, config.port);
    info!("Trip planner API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
