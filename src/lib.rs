// Library exports for the API server, the sync tool and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use services::{
    activities::ActivityStore, itineraries::ItineraryScheduler,
    recommendations::RecommendationService,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub activities: Arc<dyn ActivityStore>,
    pub scheduler: Arc<ItineraryScheduler>,
    pub recommendations: Arc<RecommendationService>,
}
