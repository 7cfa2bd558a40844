pub mod activities;
pub mod health;
pub mod itineraries;
pub mod metrics;
pub mod recommendations;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Itineraries
        .route(
            "/itineraries",
            get(itineraries::list_itineraries).post(itineraries::create_itinerary),
        )
        .route(
            "/itineraries/{id}",
            get(itineraries::get_itinerary)
                .put(itineraries::update_itinerary)
                .delete(itineraries::delete_itinerary),
        )
        .route("/itineraries/{id}/schedule", get(itineraries::get_schedule))
        // Activity catalog
        .route(
            "/activities",
            get(activities::list_activities).post(activities::create_activity),
        )
        .route("/activities/by-itinerary", get(activities::activities_by_itinerary))
        .route("/activities/{id}", get(activities::get_activity))
        .route("/activities/{id}/image", put(activities::set_activity_image))
        // Recommendations
        .route("/recommendations", get(recommendations::for_user))
        .route("/recommendations/popular", get(recommendations::popular))
        .route("/recommendations/by-country", get(recommendations::for_user_in_country))
        .route("/preferences", put(recommendations::record_preference))
        .route("/recommender/users", post(recommendations::register_user))
        .route(
            "/recommender/users/{id}/personality",
            get(recommendations::get_personality).put(recommendations::update_personality),
        )
        .with_state(state)
}
