use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        personality::{Personality, UserPersonality},
        recommender::{
            CategoryQuery, PersonalizedQuery, PopularQuery, PreferenceRequest,
            RegisterUserRequest,
        },
    },
    AppState,
};

fn required<T>(value: Option<T>, name: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation(format!("{name} is required")))
}

pub async fn popular(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PopularQuery>,
) -> AppResult<Json<Value>> {
    let limit = q.limit.unwrap_or(state.config.recommendation_limit);
    let activities = state.recommendations.popular(limit).await?;
    Ok(Json(json!({ "activities": activities })))
}

pub async fn for_user(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PersonalizedQuery>,
) -> AppResult<Json<Value>> {
    let user_id = required(q.user_id, "user_id")?;
    let limit = q.limit.unwrap_or(state.config.recommendation_limit);
    let activities = state.recommendations.personalized(&user_id, limit).await?;
    Ok(Json(json!({ "user_id": user_id, "activities": activities })))
}

pub async fn for_user_in_country(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<CategoryQuery>,
) -> AppResult<Json<Value>> {
    let user_id = required(q.user_id, "user_id")?;
    let country_id = required(q.country_id, "country_id")?;
    let limit = q.limit.unwrap_or(state.config.recommendation_limit);
    let activities = state
        .recommendations
        .personalized_in_country(&user_id, country_id, limit)
        .await?;
    Ok(Json(json!({
        "user_id": user_id,
        "country_id": country_id,
        "activities": activities,
    })))
}

/// PUT /preferences: `liked: true` adds a like, `false` withdraws it.
pub async fn record_preference(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<PreferenceRequest>,
) -> AppResult<Json<Value>> {
    state
        .recommendations
        .record_preference(&body.user_id, body.activity_id, body.liked)
        .await?;
    let action = if body.liked { "liked" } else { "unliked" };
    Ok(Json(json!({
        "message": format!("activity {} {action}", body.activity_id),
    })))
}

pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterUserRequest>,
) -> AppResult<StatusCode> {
    state.recommendations.register_user(&body.user_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn update_personality(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    ApiJson(personality): ApiJson<Personality>,
) -> AppResult<StatusCode> {
    state
        .recommendations
        .update_personality(&user_id, &personality)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_personality(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
) -> AppResult<Json<UserPersonality>> {
    let personality = state.recommendations.personality(&user_id).await?;
    Ok(Json(personality))
}
