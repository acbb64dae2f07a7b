use super::{EventStore, PageRequest};
use crate::components::event_feed::models::{CoHost, Event, EventTag, Rsvp, Tag};
use crate::components::event_feed::predicate::{Predicate, SortOrder};
use crate::error::{store_error, FeedResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

/// Exported table contents the memory store serves from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub event_tags: Vec<EventTag>,
    #[serde(default)]
    pub rsvps: Vec<Rsvp>,
    #[serde(default)]
    pub co_hosts: Vec<CoHost>,
}

/// Event store backed by an in-process dataset
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Dataset>,
}

impl MemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            data: RwLock::new(dataset),
        }
    }

    /// Load a dataset exported as JSON
    pub fn from_json_file(path: impl AsRef<Path>) -> FeedResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let dataset: Dataset = serde_json::from_str(&content)?;
        info!(
            "Loaded {} events, {} tags from {}",
            dataset.events.len(),
            dataset.tags.len(),
            path.display()
        );
        Ok(Self::new(dataset))
    }

    /// Mutate the dataset in place
    pub fn update<F>(&self, f: F) -> FeedResult<()>
    where
        F: FnOnce(&mut Dataset),
    {
        let mut data = self
            .data
            .write()
            .map_err(|_| store_error("Dataset lock poisoned"))?;
        f(&mut data);
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Dataset) -> T) -> FeedResult<T> {
        let data = self
            .data
            .read()
            .map_err(|_| store_error("Dataset lock poisoned"))?;
        Ok(f(&data))
    }
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a String>) -> Vec<String> {
    ids.cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

// Resolve the tag join the way the hosted backend embeds it
fn with_tags(dataset: &Dataset, mut event: Event) -> Event {
    if !event.tags.is_empty() {
        return event;
    }
    let by_id: HashMap<&str, &Tag> = dataset.tags.iter().map(|t| (t.id.as_str(), t)).collect();
    event.tags = dataset
        .event_tags
        .iter()
        .filter(|link| link.event_id == event.id)
        .filter_map(|link| by_id.get(link.tag_id.as_str()).map(|tag| (*tag).clone()))
        .collect();
    event
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list_events(&self, request: &PageRequest) -> FeedResult<Vec<Event>> {
        self.read(|dataset| {
            let mut matching: Vec<&Event> = dataset
                .events
                .iter()
                .filter(|event| request.predicate.matches(event))
                .collect();

            matching.sort_by(|a, b| {
                let ordering = a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id));
                match request.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });

            matching
                .into_iter()
                .skip(request.offset)
                .take(request.limit)
                .map(|event| with_tags(dataset, event.clone()))
                .collect()
        })
    }

    async fn count_events(&self, predicate: &Predicate) -> FeedResult<u64> {
        self.read(|dataset| {
            dataset
                .events
                .iter()
                .filter(|event| predicate.matches(event))
                .count() as u64
        })
    }

    async fn list_event_ids_by_any_tag(&self, tag_ids: &[String]) -> FeedResult<Vec<String>> {
        self.read(|dataset| {
            unique_ids(
                dataset
                    .event_tags
                    .iter()
                    .filter(|link| tag_ids.contains(&link.tag_id))
                    .map(|link| &link.event_id),
            )
        })
    }

    async fn list_event_ids_rsvped_by(&self, profile_id: &str) -> FeedResult<Vec<String>> {
        self.read(|dataset| {
            unique_ids(
                dataset
                    .rsvps
                    .iter()
                    .filter(|rsvp| rsvp.profile_id == profile_id)
                    .map(|rsvp| &rsvp.event_id),
            )
        })
    }

    async fn list_event_ids_co_hosted_by(&self, profile_id: &str) -> FeedResult<Vec<String>> {
        self.read(|dataset| {
            unique_ids(
                dataset
                    .co_hosts
                    .iter()
                    .filter(|co_host| co_host.profile_id == profile_id)
                    .map(|co_host| &co_host.event_id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn dataset() -> Dataset {
        let base = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let events = ["b", "a", "c"]
            .iter()
            .map(|id| Event::new(*id, *id, base, base + Duration::hours(1), "host", base))
            .collect();
        Dataset {
            events,
            tags: vec![Tag {
                id: "t1".to_string(),
                name: "music".to_string(),
            }],
            event_tags: vec![
                EventTag {
                    event_id: "a".to_string(),
                    tag_id: "t1".to_string(),
                },
                EventTag {
                    event_id: "a".to_string(),
                    tag_id: "t2".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_equal_start_dates_break_ties_by_id() {
        let store = MemoryStore::new(dataset());
        let request = PageRequest {
            predicate: Predicate::default(),
            order: SortOrder::Descending,
            offset: 0,
            limit: 10,
        };

        let ids: Vec<String> = store
            .list_events(&request)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_tag_lookup_dedupes_and_joins() {
        let store = MemoryStore::new(dataset());
        let ids = store
            .list_event_ids_by_any_tag(&["t1".to_string(), "t2".to_string()])
            .await
            .unwrap();
        assert_eq!(ids, vec!["a".to_string()]);

        let request = PageRequest {
            predicate: Predicate::default(),
            order: SortOrder::Ascending,
            offset: 0,
            limit: 1,
        };
        let events = store.list_events(&request).await.unwrap();
        assert_eq!(events[0].id, "a");
        assert_eq!(events[0].tags.len(), 1);
        assert_eq!(events[0].tags[0].name, "music");
    }

    #[test]
    fn test_dataset_parses_sparse_json() {
        let json = r#"{
            "events": [{
                "id": "e1",
                "title": "Opening night",
                "start_date": "2026-10-16T18:00:00Z",
                "end_date": "2026-10-16T21:00:00Z",
                "created_by": "p1",
                "created_at": "2026-10-01T09:00:00Z"
            }],
            "rsvps": [{"event_id": "e1", "profile_id": "p2"}]
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        assert_eq!(dataset.events[0].timezone, "UTC");
        assert!(dataset.tags.is_empty());
        assert_eq!(dataset.rsvps.len(), 1);
    }
}
