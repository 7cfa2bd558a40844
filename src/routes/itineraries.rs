use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    error::AppResult,
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::itinerary::{
        CreateItineraryRequest, Itinerary, ItineraryDay, ItinerarySummary, ItineraryWithDays,
        ModifyItineraryRequest, UserQuery,
    },
    AppState,
};

pub async fn create_itinerary(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateItineraryRequest>,
) -> AppResult<(StatusCode, Json<Itinerary>)> {
    let (user_id, fields, entries) = body.into_parts();
    let itinerary = state.scheduler.create(user_id, fields, entries).await?;
    Ok((StatusCode::CREATED, Json(itinerary)))
}

pub async fn list_itineraries(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> AppResult<Json<Vec<ItinerarySummary>>> {
    Ok(Json(state.scheduler.list_for_user(q.user_id).await?))
}

pub async fn get_itinerary(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<ItineraryWithDays>> {
    let mut itinerary = state.scheduler.get(id).await?;
    itinerary.days = with_display_urls(&state, itinerary.days);
    Ok(Json(itinerary))
}

/// PUT /itineraries/{id}: the body's `activities` replace the stored schedule.
pub async fn update_itinerary(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(body): ApiJson<ModifyItineraryRequest>,
) -> AppResult<Json<Itinerary>> {
    let (fields, entries) = body.into_parts();
    Ok(Json(state.scheduler.modify(id, fields, entries).await?))
}

pub async fn delete_itinerary(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<StatusCode> {
    state.scheduler.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_schedule(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<Value>> {
    schedule_response(&state, id).await
}

pub(crate) async fn schedule_response(
    state: &AppState,
    itinerary_id: i32,
) -> AppResult<Json<Value>> {
    let days = state.scheduler.schedule(itinerary_id).await?;
    Ok(Json(json!({
        "itinerary_id": itinerary_id,
        "days": with_display_urls(state, days),
    })))
}

fn with_display_urls(state: &AppState, mut days: Vec<ItineraryDay>) -> Vec<ItineraryDay> {
    for scheduled in days.iter_mut().flat_map(|d| d.activities.iter_mut()) {
        let activity = &mut scheduled.activity;
        activity.image_url = state.recommendations.display_url(&activity.image_url);
    }
    days
}
