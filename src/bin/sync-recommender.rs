//! Publish the activity catalog to the recommendation engine as items.
//! Run after bulk imports or when the engine's item store was reset.
//!
//! Usage: sync-recommender [--country ID]
//!   --country ID : Publish only activities of this country (all if not specified)

use clap::Parser;
use tripplanner_api::{
    config::Config,
    db,
    models::recommender::EngineItem,
    services::{
        activities::{ActivityStore, PgActivityStore},
        recommender::{GorseClient, Recommender},
    },
};

#[derive(Parser)]
#[command(name = "sync-recommender", about = "Publish activities to the recommendation engine")]
struct Args {
    /// Country id to publish (optional, all if not specified)
    #[arg(long)]
    country: Option<i32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    let store = PgActivityStore::new(pool);
    let engine = GorseClient::new(&config.recommender_url, config.recommender_timeout())?;

    let activities = match args.country {
        Some(country_id) => store.list_by_country(country_id).await?,
        None => store.list_all().await?,
    };
    tracing::info!("Publishing {} activities to {}", activities.len(), config.recommender_url);

    let mut failed = 0usize;
    for activity in &activities {
        if let Err(e) = engine.add_item(&EngineItem::from(activity)).await {
            failed += 1;
            tracing::error!("Error publishing activity {}: {}", activity.id, e);
        }
    }

    tracing::info!(
        "Sync completed: {} published, {} failed",
        activities.len() - failed,
        failed
    );
    Ok(())
}
