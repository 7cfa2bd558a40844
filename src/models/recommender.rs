use serde::{Deserialize, Serialize};

use super::activity::Activity;

pub const FEEDBACK_LIKE: &str = "like";

/// `POST /api/user`
#[derive(Debug, Clone, Serialize)]
pub struct EngineUser {
    #[serde(rename = "UserId")]
    pub user_id: String,
}

/// `POST /api/item`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineItem {
    #[serde(rename = "ItemId")]
    pub item_id: String,
    #[serde(rename = "Categories")]
    pub categories: Vec<String>,
    #[serde(rename = "Labels")]
    pub labels: Vec<String>,
}

impl From<&Activity> for EngineItem {
    /// The country is the item's category; the remaining catalog fields become labels.
    fn from(activity: &Activity) -> Self {
        Self {
            item_id: activity.id.to_string(),
            categories: vec![activity.country_id.to_string()],
            labels: vec![
                format!("name:{}", activity.name),
                format!("title:{}", activity.title),
                format!("price:{:.2}", activity.price),
                format!("address:{}", activity.address),
            ],
        }
    }
}

/// `PATCH /api/user/{id}`
#[derive(Debug, Clone, Serialize)]
pub struct EngineUserPatch {
    pub labels: Vec<String>,
}

/// One element of the `PUT /api/feedback` array.
#[derive(Debug, Clone, Serialize)]
pub struct EngineFeedback {
    #[serde(rename = "FeedbackType")]
    pub feedback_type: String,
    #[serde(rename = "ItemId")]
    pub item_id: String,
    #[serde(rename = "UserId")]
    pub user_id: String,
}

impl EngineFeedback {
    pub fn like(user_id: &str, item_id: &str) -> Self {
        Self {
            feedback_type: FEEDBACK_LIKE.into(),
            item_id: item_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Body for PUT /preferences.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreferenceRequest {
    pub user_id: String,
    pub activity_id: i32,
    pub liked: bool,
}

/// Body for POST /recommender/users.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub user_id: String,
}

/// Query params for GET /recommendations.
#[derive(Debug, Deserialize)]
pub struct PersonalizedQuery {
    pub user_id: Option<String>,
    pub limit: Option<usize>,
}

/// Query params for GET /recommendations/by-country.
#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub user_id: Option<String>,
    pub country_id: Option<i32>,
    pub limit: Option<usize>,
}

/// Query params for GET /recommendations/popular.
#[derive(Debug, Deserialize)]
pub struct PopularQuery {
    pub limit: Option<usize>,
}
