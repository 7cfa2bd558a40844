use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Catalog entry. `image_url` holds the object key (or an absolute URL) as stored;
/// read paths that face users rewrite it into a display URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: i32,
    pub name: String,
    pub title: String,
    pub price: f64,
    pub address: String,
    #[serde(rename = "imageurl")]
    pub image_url: String,
    #[serde(rename = "countryid")]
    pub country_id: i32,
}

/// Body for POST /activities.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateActivityRequest {
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default, alias = "imageurl")]
    pub image_url: String,
    #[serde(alias = "countryid")]
    pub country_id: i32,
}

impl CreateActivityRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".into());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err("price must be a non-negative number".into());
        }
        Ok(())
    }
}

/// Body for PUT /activities/{id}/image.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetImageRequest {
    #[serde(alias = "imageurl")]
    pub image_url: String,
}

/// Query params for GET /activities.
#[derive(Debug, Deserialize)]
pub struct CountryQuery {
    pub country_id: i32,
}

/// Query params for GET /activities/by-itinerary.
#[derive(Debug, Deserialize)]
pub struct ItineraryQuery {
    pub itinerary_id: i32,
}
