mod common;

use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use common::{community, ids, now, seven_days, MockEventStore, Op, PAGE_SIZE};
use pretty_assertions::assert_eq;
use zuifeed::components::event_feed::predicate::{EmptyReason, QueryPlan};
use zuifeed::components::event_feed::{count_events, fetch_page, resolve_plan, FeedQuery, TabType};
use zuifeed::components::EventStore;

const TZ: Tz = chrono_tz::UTC;

/// Walk every page of `query` the way a scrolling client would
async fn all_pages(store: &dyn EventStore, query: &FeedQuery) -> Vec<String> {
    let mut loaded = Vec::new();
    for page in 0.. {
        let result = fetch_page(store, query, page, PAGE_SIZE, now(), TZ)
            .await
            .unwrap();
        assert!(result.events.len() <= PAGE_SIZE);
        loaded.extend(ids(&result.events));
        if !result.has_more {
            break;
        }
    }
    loaded
}

fn queries() -> Vec<FeedQuery> {
    let mut queries: Vec<FeedQuery> = TabType::ALL
        .iter()
        .map(|tab| FeedQuery::new(*tab).with_profile("p9"))
        .collect();
    queries.push(FeedQuery::new(TabType::Upcoming).with_tags(["music", "outdoor"]));
    queries.push(FeedQuery::new(TabType::Hosting).with_profile("p1"));
    queries.push(FeedQuery::new(TabType::Going).with_profile("p9").with_tags(["food"]));
    queries.push(FeedQuery::new(TabType::All).with_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()));
    queries.push(FeedQuery::new(TabType::Past).with_tags(["music"]));
    queries
}

#[tokio::test]
async fn test_upcoming_first_page_and_tail() {
    let store = MockEventStore::new(seven_days());
    let query = FeedQuery::new(TabType::Upcoming);

    let first = fetch_page(&store, &query, 0, PAGE_SIZE, now(), TZ).await.unwrap();
    assert_eq!(ids(&first.events), vec!["d0", "d1", "d2", "d3", "d4"]);
    assert!(first.has_more);

    let second = fetch_page(&store, &query, 1, PAGE_SIZE, now(), TZ).await.unwrap();
    assert_eq!(ids(&second.events), vec!["d5", "d6"]);
    assert!(!second.has_more);

    assert_eq!(count_events(&store, &query, now(), TZ).await.unwrap(), 7);
}

#[tokio::test]
async fn test_count_matches_concatenated_pages() {
    let store = MockEventStore::new(community());

    for query in queries() {
        let loaded = all_pages(&store, &query).await;
        let total = count_events(&store, &query, now(), TZ).await.unwrap();
        assert_eq!(total as usize, loaded.len(), "count mismatch for {:?}", query);
    }
}

#[tokio::test]
async fn test_pages_follow_tab_ordering_without_duplicates() {
    let store = MockEventStore::new(community());

    for query in queries() {
        let loaded = all_pages(&store, &query).await;
        let mut unique = loaded.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), loaded.len(), "duplicates in {:?}", query);
    }

    let upcoming = all_pages(&store, &FeedQuery::new(TabType::Upcoming)).await;
    assert_eq!(
        upcoming,
        vec!["evening", "festival", "talk", "hike", "dinner", "retreat"]
    );

    let past = all_pages(&store, &FeedQuery::new(TabType::Past)).await;
    assert_eq!(past, vec!["morning", "past-recent", "past-long"]);
}

#[tokio::test]
async fn test_today_tab_uses_local_day() {
    let store = MockEventStore::new(community());
    let today = all_pages(&store, &FeedQuery::new(TabType::Today)).await;
    assert_eq!(today, vec!["morning", "running", "evening"]);
}

#[tokio::test]
async fn test_new_tab_covers_last_day_of_creations() {
    let store = MockEventStore::new(community());
    let new = all_pages(&store, &FeedQuery::new(TabType::New)).await;

    // "talk" was created 23h ago, "hike" 25h ago
    assert_eq!(new, vec!["talk", "dinner"]);
}

#[tokio::test]
async fn test_going_returns_rsvped_events() {
    let store = MockEventStore::new(community());

    let going = all_pages(&store, &FeedQuery::new(TabType::Going).with_profile("p9")).await;
    assert_eq!(going, vec!["past-long", "festival", "dinner"]);
    assert_eq!(store.calls(Op::Rsvps), 1);
}

#[tokio::test]
async fn test_going_intersects_tags_with_rsvps() {
    let store = MockEventStore::new(community());
    let query = FeedQuery::new(TabType::Going)
        .with_profile("p9")
        .with_tags(["music"]);

    assert_eq!(all_pages(&store, &query).await, vec!["festival"]);
}

#[tokio::test]
async fn test_going_without_rsvps_is_empty() {
    let store = MockEventStore::new(community());
    let query = FeedQuery::new(TabType::Going).with_profile("nobody");

    let plan = resolve_plan(&store, &query, now(), TZ).await.unwrap();
    assert_eq!(plan, QueryPlan::Empty(EmptyReason::NoRsvps));
    assert_eq!(all_pages(&store, &query).await, Vec::<String>::new());
    assert_eq!(store.calls(Op::List), 0);
}

#[tokio::test]
async fn test_hosting_includes_co_hosted_events() {
    let store = MockEventStore::new(community());
    let query = FeedQuery::new(TabType::Hosting).with_profile("p1");

    let first = fetch_page(&store, &query, 0, PAGE_SIZE, now(), TZ).await.unwrap();
    assert_eq!(
        ids(&first.events),
        vec!["past-long", "morning", "talk", "dinner", "retreat"]
    );
    // A full page always offers another one
    assert!(first.has_more);

    let second = fetch_page(&store, &query, 1, PAGE_SIZE, now(), TZ).await.unwrap();
    assert!(second.events.is_empty());
    assert!(!second.has_more);
}

#[tokio::test]
async fn test_profile_tabs_without_profile_skip_the_store() {
    let store = MockEventStore::new(community());

    for tab in [TabType::Going, TabType::Hosting] {
        let query = FeedQuery::new(tab).with_tags(["music"]);
        let page = fetch_page(&store, &query, 0, PAGE_SIZE, now(), TZ).await.unwrap();
        assert!(page.events.is_empty());
        assert!(!page.has_more);
        assert_eq!(count_events(&store, &query, now(), TZ).await.unwrap(), 0);
    }

    for op in [Op::List, Op::Count, Op::Tags, Op::Rsvps, Op::CoHosts] {
        assert_eq!(store.calls(op), 0, "{:?} was called", op);
    }
}

#[tokio::test]
async fn test_tag_filter_is_an_or() {
    let store = MockEventStore::new(community());

    let music = all_pages(&store, &FeedQuery::new(TabType::All).with_tags(["music"])).await;
    let outdoor = all_pages(&store, &FeedQuery::new(TabType::All).with_tags(["outdoor"])).await;
    let both = all_pages(
        &store,
        &FeedQuery::new(TabType::All).with_tags(["music", "outdoor"]),
    )
    .await;

    let mut union: Vec<String> = music.iter().chain(outdoor.iter()).cloned().collect();
    union.sort();
    union.dedup();
    let mut sorted_both = both.clone();
    sorted_both.sort();
    assert_eq!(sorted_both, union);
    assert_eq!(both, vec!["past-recent", "evening", "festival", "hike"]);
}

#[tokio::test]
async fn test_unknown_tag_short_circuits() {
    let store = MockEventStore::new(community());
    let query = FeedQuery::new(TabType::Going)
        .with_profile("p9")
        .with_tags(["karaoke"]);

    let plan = resolve_plan(&store, &query, now(), TZ).await.unwrap();
    assert_eq!(plan, QueryPlan::Empty(EmptyReason::NoTaggedEvents));
    assert_eq!(store.calls(Op::Tags), 1);
    // The RSVP lookup is never needed
    assert_eq!(store.calls(Op::Rsvps), 0);
}

#[tokio::test]
async fn test_date_filter_matches_overlapping_events() {
    let store = MockEventStore::new(community());
    let query = FeedQuery::new(TabType::All).with_date(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());

    // The three-day festival is still running on the 19th
    assert_eq!(all_pages(&store, &query).await, vec!["festival", "hike", "dinner"]);
}

#[tokio::test]
async fn test_date_filter_uses_configured_timezone() {
    let store = MockEventStore::new(community());
    store.update(|data| {
        // 22:30 UTC on the 17th is already the 18th in Zurich
        data.events.push(common::event(
            "late",
            common::day0() + Duration::days(1) + Duration::minutes(22 * 60 + 30),
            1,
            "p2",
        ));
    });
    let query = FeedQuery::new(TabType::All).with_date(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
    let zurich: Tz = "Europe/Zurich".parse().unwrap();

    let utc = fetch_page(&store, &query, 0, PAGE_SIZE, now(), TZ).await.unwrap();
    let local = fetch_page(&store, &query, 0, PAGE_SIZE, now(), zurich).await.unwrap();

    assert!(!ids(&utc.events).contains(&"late".to_string()));
    assert!(ids(&local.events).contains(&"late".to_string()));
}

#[tokio::test]
async fn test_membership_failure_fails_the_page() {
    let store = MockEventStore::new(community());
    store.fail(Op::Rsvps);
    let query = FeedQuery::new(TabType::Going).with_profile("p9");

    let result = fetch_page(&store, &query, 0, PAGE_SIZE, now(), TZ).await;
    assert!(result.is_err());
    assert_eq!(store.calls(Op::List), 0);
}
