use crate::error::{config_error, Error};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Named view of the event feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TabType {
    Today,
    #[default]
    Upcoming,
    Going,
    Hosting,
    Past,
    New,
    /// Unfiltered/search view, no temporal predicate
    All,
}

impl TabType {
    pub const ALL: [TabType; 7] = [
        TabType::Today,
        TabType::Upcoming,
        TabType::Going,
        TabType::Hosting,
        TabType::Past,
        TabType::New,
        TabType::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TabType::Today => "today",
            TabType::Upcoming => "upcoming",
            TabType::Going => "going",
            TabType::Hosting => "hosting",
            TabType::Past => "past",
            TabType::New => "new",
            TabType::All => "all",
        }
    }

    /// Tabs that only make sense for a signed-in profile
    pub fn needs_profile(&self) -> bool {
        matches!(self, TabType::Going | TabType::Hosting)
    }
}

impl fmt::Display for TabType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(TabType::Today),
            "upcoming" => Ok(TabType::Upcoming),
            "going" => Ok(TabType::Going),
            "hosting" => Ok(TabType::Hosting),
            "past" => Ok(TabType::Past),
            "new" => Ok(TabType::New),
            "" | "all" | "search" | "default" => Ok(TabType::All),
            other => Err(config_error(&format!("Unknown feed tab: {}", other))),
        }
    }
}

/// Everything that decides which events a feed shows
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedQuery {
    pub tab: TabType,
    /// Tag ids, matched with OR semantics
    pub tag_filters: BTreeSet<String>,
    pub selected_date: Option<NaiveDate>,
    pub profile_id: Option<String>,
}

impl FeedQuery {
    pub fn new(tab: TabType) -> Self {
        Self {
            tab,
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_filters = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.selected_date = Some(date);
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }
}
