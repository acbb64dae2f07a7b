use crate::components::event_feed::{FeedQuery, TabType};
use crate::error::{config_error, env_error, FeedResult};
use chrono::NaiveDate;
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of events per page
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Seconds between background refreshes of the first page
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Location of the optional feed settings file
pub const FEED_CONFIG_PATH: &str = "config/feed.toml";

/// Settings that shape how the feed controller pages and refreshes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSettings {
    pub page_size: usize,
    pub refresh_interval_secs: u64,
    /// Keep loaded pages when `reset` is requested
    pub skip_reset: bool,
    /// IANA timezone used for "today" and selected-day bounds
    pub timezone: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            skip_reset: false,
            timezone: String::from("UTC"),
        }
    }
}

impl FeedSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Parse the configured timezone
    pub fn tz(&self) -> FeedResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| config_error(&format!("Invalid timezone '{}': {}", self.timezone, e)))
    }
}

/// Partial settings read from `config/feed.toml`
#[derive(Debug, Default, Deserialize)]
struct FeedFileConfig {
    page_size: Option<usize>,
    refresh_interval_secs: Option<u64>,
    skip_reset: Option<bool>,
    timezone: Option<String>,
}

/// Main configuration structure for the feed runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the hosted backend, e.g. https://xyz.supabase.co
    pub supabase_url: Option<String>,
    /// Public anon key sent as `apikey`
    pub supabase_anon_key: Option<String>,
    /// Signed-in user's access token, falls back to the anon key
    pub supabase_access_token: Option<String>,
    /// JSON dataset used instead of the hosted backend
    pub dataset_path: Option<PathBuf>,
    pub feed: FeedSettings,
    /// Query the runner opens the feed with
    pub query: FeedQuery,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> FeedResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let supabase_url = env::var("SUPABASE_URL").ok().filter(|v| !v.is_empty());
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY").ok().filter(|v| !v.is_empty());
        let supabase_access_token = env::var("SUPABASE_ACCESS_TOKEN")
            .ok()
            .filter(|v| !v.is_empty());
        let dataset_path = env::var("FEED_DATASET").ok().map(PathBuf::from);

        if supabase_url.is_some() && supabase_anon_key.is_none() {
            return Err(env_error("SUPABASE_ANON_KEY"));
        }

        let mut feed = FeedSettings::default();
        if let Ok(timezone) = env::var("TIMEZONE") {
            feed.timezone = timezone;
        }

        // File settings override the defaults
        if Path::new(FEED_CONFIG_PATH).exists() {
            let content = fs::read_to_string(FEED_CONFIG_PATH)?;
            feed = merge_file_settings(feed, &content)?;
        }
        if feed.page_size == 0 {
            return Err(config_error("page_size must be greater than zero"));
        }
        if feed.refresh_interval_secs == 0 {
            return Err(config_error("refresh_interval_secs must be greater than zero"));
        }
        feed.tz()?;

        let query = query_from_env()?;

        Ok(Config {
            supabase_url,
            supabase_anon_key,
            supabase_access_token,
            dataset_path,
            feed,
            query,
        })
    }
}

/// Apply the values present in a feed.toml document on top of `base`
pub fn merge_file_settings(base: FeedSettings, content: &str) -> FeedResult<FeedSettings> {
    let file: FeedFileConfig = toml::from_str(content)?;
    Ok(FeedSettings {
        page_size: file.page_size.unwrap_or(base.page_size),
        refresh_interval_secs: file
            .refresh_interval_secs
            .unwrap_or(base.refresh_interval_secs),
        skip_reset: file.skip_reset.unwrap_or(base.skip_reset),
        timezone: file.timezone.unwrap_or(base.timezone),
    })
}

fn query_from_env() -> FeedResult<FeedQuery> {
    let tab = match env::var("FEED_TAB") {
        Ok(value) => value.parse::<TabType>()?,
        Err(_) => TabType::Upcoming,
    };

    let tag_filters: BTreeSet<String> = env::var("FEED_TAGS")
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let selected_date = match env::var("FEED_DATE") {
        Ok(value) => Some(
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map_err(|e| config_error(&format!("Invalid FEED_DATE '{}': {}", value, e)))?,
        ),
        Err(_) => None,
    };

    let profile_id = env::var("FEED_PROFILE_ID").ok().filter(|v| !v.is_empty());

    Ok(FeedQuery {
        tab,
        tag_filters,
        selected_date,
        profile_id,
    })
}
