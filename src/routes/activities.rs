use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::activity::{
        Activity, CountryQuery, CreateActivityRequest, ItineraryQuery, SetImageRequest,
    },
    routes::itineraries::schedule_response,
    AppState,
};

/// POST /activities. The new activity is also published to the recommender;
/// a failed publish does not fail the request.
pub async fn create_activity(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateActivityRequest>,
) -> AppResult<(StatusCode, Json<Activity>)> {
    body.validate().map_err(AppError::Validation)?;
    let activity = state.activities.create(&body).await?;
    info!("Created activity {} in country {}", activity.id, activity.country_id);

    if let Err(e) = state.recommendations.publish_activity(&activity).await {
        warn!("Activity {} not published to recommender: {}", activity.id, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(state.recommendations.with_display_url(activity)),
    ))
}

pub async fn get_activity(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Activity>> {
    let activity = state
        .activities
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("activity {id} not found")))?;
    Ok(Json(state.recommendations.with_display_url(activity)))
}

pub async fn list_activities(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<CountryQuery>,
) -> AppResult<Json<Vec<Activity>>> {
    let activities = state
        .activities
        .list_by_country(q.country_id)
        .await?
        .into_iter()
        .map(|a| state.recommendations.with_display_url(a))
        .collect();
    Ok(Json(activities))
}

pub async fn set_activity_image(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<SetImageRequest>,
) -> AppResult<StatusCode> {
    let image_url = body.image_url.trim();
    if image_url.is_empty() {
        return Err(AppError::validation("image_url is required"));
    }
    if !state.activities.set_image_url(id, image_url).await? {
        return Err(AppError::not_found(format!("activity {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activities_by_itinerary(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<ItineraryQuery>,
) -> AppResult<Json<Value>> {
    schedule_response(&state, q.itinerary_id).await
}
