use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::activity::Activity;

/// One (activity, day, optional time window, optional order) association as sent
/// by the caller and echoed back on writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub activity_id: i32,
    pub day_number: i32,
    #[serde(default, with = "time_of_day")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "time_of_day")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub order_in_day: Option<i32>,
}

/// Scalar itinerary fields shared by create and modify.
#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryFields {
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ItineraryFields {
    pub fn validate(&self, entries: &[ScheduleEntry]) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".into());
        }
        if self.start_date > self.end_date {
            return Err(format!(
                "start_date {} must not be after end_date {}",
                self.start_date, self.end_date
            ));
        }
        if let Some(bad) = entries.iter().find(|e| e.day_number < 1) {
            return Err(format!(
                "day_number must be at least 1 (activity {} has {})",
                bad.activity_id, bad.day_number
            ));
        }
        Ok(())
    }
}

/// Full itinerary as returned by create/modify: entries are the caller's values.
#[derive(Debug, Clone, Serialize)]
pub struct Itinerary {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub activities: Vec<ScheduleEntry>,
}

impl Itinerary {
    pub fn assemble(
        id: i32,
        user_id: i32,
        fields: ItineraryFields,
        activities: Vec<ScheduleEntry>,
    ) -> Self {
        Self {
            id,
            user_id,
            title: fields.title,
            description: fields.description,
            start_date: fields.start_date,
            end_date: fields.end_date,
            activities,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ItinerarySummary {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItineraryWithDays {
    #[serde(flatten)]
    pub itinerary: ItinerarySummary,
    pub days: Vec<ItineraryDay>,
}

/// Derived read view: one day of an itinerary, entries already in schedule order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItineraryDay {
    pub day_number: i32,
    pub date: NaiveDate,
    pub activities: Vec<ScheduledActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledActivity {
    pub activity: Activity,
    #[serde(with = "time_of_day")]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "time_of_day")]
    pub end_time: Option<NaiveTime>,
    pub order_in_day: Option<i32>,
}

/// Schedule join row: entry metadata, the itinerary start date and the activity.
#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub day_number: i32,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub order_in_day: Option<i32>,
    pub start_date: NaiveDate,
    #[sqlx(flatten)]
    pub activity: Activity,
}

/// Body for POST /itineraries.
#[derive(Debug, Deserialize)]
pub struct CreateItineraryRequest {
    pub user_id: i32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "startDate")]
    pub start_date: NaiveDate,
    #[serde(alias = "endDate")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub activities: Vec<ScheduleEntry>,
}

impl CreateItineraryRequest {
    pub fn into_parts(self) -> (i32, ItineraryFields, Vec<ScheduleEntry>) {
        let fields = ItineraryFields {
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
        };
        (self.user_id, fields, self.activities)
    }
}

/// Body for PUT /itineraries/{id}. `activities` is the complete desired schedule.
#[derive(Debug, Deserialize)]
pub struct ModifyItineraryRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "startDate")]
    pub start_date: NaiveDate,
    #[serde(alias = "endDate")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub activities: Vec<ScheduleEntry>,
}

impl ModifyItineraryRequest {
    pub fn into_parts(self) -> (ItineraryFields, Vec<ScheduleEntry>) {
        let fields = ItineraryFields {
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
        };
        (fields, self.activities)
    }
}

/// Query params for GET /itineraries.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: i32,
}

/// `"HH:MM"` times of day. Input also accepts `"HH:MM:SS"`; blank means unset.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| format!("invalid time of day '{raw}', expected HH:MM"))
    }

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_some(&t.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse(s).map(Some).map_err(D::Error::custom),
        }
    }
}
