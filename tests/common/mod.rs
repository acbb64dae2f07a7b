#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use zuifeed::components::event_feed::models::{CoHost, Event, EventTag, Rsvp, Tag};
use zuifeed::components::event_feed::predicate::Predicate;
use zuifeed::components::event_store::{Dataset, EventStore, MemoryStore, PageRequest};
use zuifeed::config::FeedSettings;
use zuifeed::error::{store_error, FeedResult};

/// Store operations the mock can count or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    List,
    Count,
    Tags,
    Rsvps,
    CoHosts,
}

/// Memory store wrapper that counts calls, injects failures and can hold
/// list queries until released
#[derive(Default)]
pub struct MockEventStore {
    inner: MemoryStore,
    list_calls: AtomicUsize,
    count_calls: AtomicUsize,
    tag_calls: AtomicUsize,
    rsvp_calls: AtomicUsize,
    co_host_calls: AtomicUsize,
    failing: Mutex<HashSet<Op>>,
    list_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockEventStore {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            inner: MemoryStore::new(dataset),
            ..Default::default()
        }
    }

    pub fn calls(&self, op: Op) -> usize {
        let counter = match op {
            Op::List => &self.list_calls,
            Op::Count => &self.count_calls,
            Op::Tags => &self.tag_calls,
            Op::Rsvps => &self.rsvp_calls,
            Op::CoHosts => &self.co_host_calls,
        };
        counter.load(Ordering::SeqCst)
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Make list queries wait for `release_lists`
    pub fn hold_lists(&self) {
        *self.list_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_lists(&self, n: usize) {
        if let Some(gate) = self.list_gate.lock().unwrap().as_ref() {
            gate.add_permits(n);
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Dataset)) {
        self.inner.update(f).unwrap();
    }

    fn check(&self, op: Op) -> FeedResult<()> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(store_error(&format!("{:?} query failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    async fn list_events(&self, request: &PageRequest) -> FeedResult<Vec<Event>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        self.check(Op::List)?;
        self.inner.list_events(request).await
    }

    async fn count_events(&self, predicate: &Predicate) -> FeedResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Op::Count)?;
        self.inner.count_events(predicate).await
    }

    async fn list_event_ids_by_any_tag(&self, tag_ids: &[String]) -> FeedResult<Vec<String>> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Op::Tags)?;
        self.inner.list_event_ids_by_any_tag(tag_ids).await
    }

    async fn list_event_ids_rsvped_by(&self, profile_id: &str) -> FeedResult<Vec<String>> {
        self.rsvp_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Op::Rsvps)?;
        self.inner.list_event_ids_rsvped_by(profile_id).await
    }

    async fn list_event_ids_co_hosted_by(&self, profile_id: &str) -> FeedResult<Vec<String>> {
        self.co_host_calls.fetch_add(1, Ordering::SeqCst);
        self.check(Op::CoHosts)?;
        self.inner.list_event_ids_co_hosted_by(profile_id).await
    }
}

pub const PAGE_SIZE: usize = 5;

/// Midnight UTC of "today" in every fixture
pub fn day0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap()
}

/// "Now" in every fixture: day 0, 08:00
pub fn now() -> DateTime<Utc> {
    day0() + Duration::hours(8)
}

pub fn settings() -> FeedSettings {
    FeedSettings {
        page_size: PAGE_SIZE,
        refresh_interval_secs: 60,
        skip_reset: false,
        timezone: "UTC".to_string(),
    }
}

pub fn event(id: &str, start: DateTime<Utc>, hours: i64, created_by: &str) -> Event {
    Event::new(
        id,
        format!("Event {}", id),
        start,
        start + Duration::hours(hours),
        created_by,
        now() - Duration::days(30),
    )
}

/// Seven one-hour events at 10:00 on seven consecutive days from today
pub fn seven_days() -> Dataset {
    Dataset {
        events: (0..7)
            .map(|i| {
                event(
                    &format!("d{}", i),
                    day0() + Duration::days(i) + Duration::hours(10),
                    1,
                    "host",
                )
            })
            .collect(),
        ..Default::default()
    }
}

/// A mixed community calendar with tags, RSVPs and co-hosts
pub fn community() -> Dataset {
    let mut events = vec![
        event("past-long", day0() - Duration::days(10), 2, "p1"),
        event("past-recent", day0() - Duration::days(1), 2, "p2"),
        event("morning", day0() + Duration::hours(6), 1, "p1"),
        event("running", day0() + Duration::hours(7), 3, "p3"),
        event("evening", day0() + Duration::hours(19), 2, "p2"),
        event("festival", day0() + Duration::days(1), 72, "p3"),
        event("talk", day0() + Duration::days(2) + Duration::hours(15), 1, "p1"),
        event("hike", day0() + Duration::days(3) + Duration::hours(7), 8, "p2"),
        event("dinner", day0() + Duration::days(3) + Duration::hours(19), 3, "p3"),
        event("retreat", day0() + Duration::days(9), 48, "p1"),
    ];
    // Freshly created ones for the "new" tab
    for event in events.iter_mut() {
        match event.id.as_str() {
            "talk" => event.created_at = now() - Duration::hours(23),
            "hike" => event.created_at = now() - Duration::hours(25),
            "dinner" => event.created_at = now() - Duration::minutes(5),
            _ => {}
        }
    }

    let tag = |id: &str, name: &str| Tag {
        id: id.to_string(),
        name: name.to_string(),
    };
    let link = |event_id: &str, tag_id: &str| EventTag {
        event_id: event_id.to_string(),
        tag_id: tag_id.to_string(),
    };
    let rsvp = |event_id: &str, profile_id: &str| Rsvp {
        event_id: event_id.to_string(),
        profile_id: profile_id.to_string(),
    };

    Dataset {
        events,
        tags: vec![tag("music", "Music"), tag("outdoor", "Outdoor"), tag("food", "Food")],
        event_tags: vec![
            link("evening", "music"),
            link("festival", "music"),
            link("festival", "outdoor"),
            link("hike", "outdoor"),
            link("dinner", "food"),
            link("past-recent", "music"),
        ],
        rsvps: vec![
            rsvp("past-long", "p9"),
            rsvp("festival", "p9"),
            rsvp("dinner", "p9"),
            rsvp("talk", "p2"),
        ],
        co_hosts: vec![CoHost {
            event_id: "dinner".to_string(),
            profile_id: "p1".to_string(),
        }],
    }
}

pub fn ids(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.id.clone()).collect()
}
