use super::{EventStore, PageRequest};
use crate::components::event_feed::models::{Event, Tag};
use crate::components::event_feed::predicate::{Clause, Predicate};
use crate::error::{config_error, store_error, FeedResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

// Table names in the hosted schema
pub mod tables {
    pub const EVENTS: &str = "events";
    pub const EVENT_TAGS: &str = "event_tags";
    pub const RSVPS: &str = "rsvps";
    pub const CO_HOSTS: &str = "event_co_hosts";
}

/// Columns plus the embedded creator, location and tag joins
const EVENT_SELECT: &str = "*,creator:profiles!events_created_by_fkey(id,username),\
location:locations(name,building,floor),event_tags(tag:tags(id,name))";

const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Event store speaking PostgREST to the hosted backend
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    rest_url: Url,
    anon_key: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagLink {
    tag: Option<Tag>,
}

#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(flatten)]
    event: Event,
    #[serde(default)]
    event_tags: Vec<TagLink>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        let mut event = row.event;
        event.tags = row.event_tags.into_iter().filter_map(|link| link.tag).collect();
        event
    }
}

#[derive(Debug, Deserialize)]
struct EventIdRow {
    event_id: String,
}

impl SupabaseStore {
    /// Create a store for the project at `base_url`
    pub fn new(
        base_url: &str,
        anon_key: impl Into<String>,
        access_token: Option<String>,
    ) -> FeedResult<Self> {
        let rest_url = Url::parse(base_url)
            .and_then(|url| url.join("rest/v1/"))
            .map_err(|e| config_error(&format!("Invalid SUPABASE_URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            rest_url,
            anon_key: anon_key.into(),
            access_token,
        })
    }

    fn table_url(&self, table: &str, params: &[(String, String)]) -> FeedResult<Url> {
        let mut url = self
            .rest_url
            .join(table)
            .map_err(|e| store_error(&format!("Failed to build URL for {}: {}", table, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get(
        &self,
        table: &str,
        params: &[(String, String)],
        count_exact: bool,
    ) -> FeedResult<Response> {
        let url = self.table_url(table, params)?;
        debug!("GET {}", url);

        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        let mut request = self
            .client
            .get(url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer));
        if count_exact {
            request = request.header("Prefer", "count=exact");
        }

        let response = request
            .send()
            .await
            .map_err(|e| store_error(&format!("Request to {} failed: {}", table, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(store_error(&format!(
                "Query on {} failed: HTTP {} - {}",
                table, status, error_body
            )));
        }

        Ok(response)
    }

    async fn event_ids(&self, table: &str, filter: (String, String)) -> FeedResult<Vec<String>> {
        let params = vec![("select".to_string(), "event_id".to_string()), filter];
        let rows: Vec<EventIdRow> = self
            .get(table, &params, false)
            .await?
            .json()
            .await
            .map_err(|e| store_error(&format!("Failed to parse {} rows: {}", table, e)))?;

        Ok(rows
            .into_iter()
            .map(|row| row.event_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quoted_list<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    let items: Vec<String> = values.into_iter().map(|value| quoted(value)).collect();
    format!("({})", items.join(","))
}

/// PostgREST filter parameters for a predicate
pub(crate) fn encode_filters(predicate: &Predicate) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for clause in predicate.clauses() {
        match clause {
            Clause::IdIn(ids) => params.push(("id".to_string(), format!("in.{}", quoted_list(ids)))),
            Clause::StartBetween { from, to } => {
                params.push(("start_date".to_string(), format!("gte.{}", timestamp(from))));
                params.push(("start_date".to_string(), format!("lte.{}", timestamp(to))));
            }
            Clause::StartAfter(at) => {
                params.push(("start_date".to_string(), format!("gt.{}", timestamp(at))))
            }
            Clause::EndBefore(at) => {
                params.push(("end_date".to_string(), format!("lt.{}", timestamp(at))))
            }
            Clause::CreatedSince(since) => {
                params.push(("created_at".to_string(), format!("gte.{}", timestamp(since))))
            }
            Clause::Overlaps { from, to } => {
                params.push(("start_date".to_string(), format!("lte.{}", timestamp(to))));
                params.push(("end_date".to_string(), format!("gte.{}", timestamp(from))));
            }
            Clause::HostedBy {
                profile_id,
                co_hosted,
            } => {
                let creator = format!("created_by.eq.{}", quoted(profile_id));
                if co_hosted.is_empty() {
                    params.push(("or".to_string(), format!("({})", creator)));
                } else {
                    params.push((
                        "or".to_string(),
                        format!("({},id.in.{})", creator, quoted_list(co_hosted)),
                    ));
                }
            }
        }
    }
    params
}

/// Total from a `Content-Range` header such as `0-4/42` or `*/42`
pub(crate) fn parse_content_range_total(header: &str) -> FeedResult<u64> {
    header
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| store_error(&format!("Unexpected Content-Range: {}", header)))
}

#[async_trait]
impl EventStore for SupabaseStore {
    async fn list_events(&self, request: &PageRequest) -> FeedResult<Vec<Event>> {
        let direction = request.order.as_str();
        let mut params = vec![("select".to_string(), EVENT_SELECT.to_string())];
        params.extend(encode_filters(&request.predicate));
        params.push((
            "order".to_string(),
            format!("start_date.{},id.{}", direction, direction),
        ));
        params.push(("offset".to_string(), request.offset.to_string()));
        params.push(("limit".to_string(), request.limit.to_string()));

        let rows: Vec<EventRow> = self
            .get(tables::EVENTS, &params, false)
            .await?
            .json()
            .await
            .map_err(|e| store_error(&format!("Failed to parse events: {}", e)))?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn count_events(&self, predicate: &Predicate) -> FeedResult<u64> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(encode_filters(predicate));
        params.push(("limit".to_string(), "0".to_string()));

        let response = self.get(tables::EVENTS, &params, true).await?;
        let header = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| store_error("Count response has no Content-Range header"))?;

        parse_content_range_total(header)
    }

    async fn list_event_ids_by_any_tag(&self, tag_ids: &[String]) -> FeedResult<Vec<String>> {
        self.event_ids(
            tables::EVENT_TAGS,
            ("tag_id".to_string(), format!("in.{}", quoted_list(tag_ids))),
        )
        .await
    }

    async fn list_event_ids_rsvped_by(&self, profile_id: &str) -> FeedResult<Vec<String>> {
        self.event_ids(
            tables::RSVPS,
            ("profile_id".to_string(), format!("eq.{}", profile_id)),
        )
        .await
    }

    async fn list_event_ids_co_hosted_by(&self, profile_id: &str) -> FeedResult<Vec<String>> {
        self.event_ids(
            tables::CO_HOSTS,
            ("profile_id".to_string(), format!("eq.{}", profile_id)),
        )
        .await
    }
}
