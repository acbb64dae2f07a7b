use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Creator profile joined onto an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub username: Option<String>,
}

/// Location joined onto an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// Event row with its creator, location and tags resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_all_day: bool,
    #[serde(default = "default_timezone", deserialize_with = "null_as_utc")]
    pub timezone: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub location_text: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub speakers: Option<String>,
    #[serde(default)]
    pub av_needs: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub recurring_pattern_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_recurring_instance: bool,
    #[serde(default)]
    pub parent_event_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_exception: bool,
    #[serde(default)]
    pub instance_date: Option<NaiveDate>,
    #[serde(default)]
    pub creator: Option<ProfileSummary>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<Tag>,
}

fn default_timezone() -> String {
    String::from("UTC")
}

// Nullable columns come back as `null`, not as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_utc<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_timezone))
}

impl Event {
    /// Create a bare event with the fields every row carries
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            start_date,
            end_date,
            is_all_day: false,
            timezone: default_timezone(),
            location_id: None,
            location_text: None,
            color: None,
            speakers: None,
            av_needs: None,
            link: None,
            created_by: created_by.into(),
            created_at,
            recurring_pattern_id: None,
            is_recurring_instance: false,
            parent_event_id: None,
            is_exception: false,
            instance_date: None,
            creator: None,
            location: None,
            tags: Vec::new(),
        }
    }

    /// Human-readable place, preferring the joined location
    pub fn place(&self) -> Option<String> {
        match (&self.location, &self.location_text) {
            (Some(location), _) => Some(match &location.building {
                Some(building) => format!("{} ({})", location.name, building),
                None => location.name.clone(),
            }),
            (None, Some(text)) => Some(text.clone()),
            (None, None) => None,
        }
    }
}

/// Event ↔ tag relation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTag {
    pub event_id: String,
    pub tag_id: String,
}

/// Attendance intent; existence means "going"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsvp {
    pub event_id: String,
    pub profile_id: String,
}

/// Edit rights granted alongside the creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoHost {
    pub event_id: String,
    pub profile_id: String,
}
