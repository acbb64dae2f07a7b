use super::models::Event;
use super::predicate::{build_predicate, sort_order, Memberships, QueryPlan};
use super::query::{FeedQuery, TabType};
use crate::components::event_store::{EventStore, PageRequest};
use crate::error::{store_error, FeedResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// One page of a tab
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub events: Vec<Event>,
    pub page: usize,
    /// A full page came back, so another may follow
    pub has_more: bool,
}

impl FeedPage {
    fn empty(page: usize) -> Self {
        Self {
            events: Vec::new(),
            page,
            has_more: false,
        }
    }
}

/// Run the membership sub-queries `query` needs, in order, then build the
/// shared predicate. Any sub-query failure fails the whole plan.
pub async fn resolve_plan(
    store: &dyn EventStore,
    query: &FeedQuery,
    now: DateTime<Utc>,
    tz: Tz,
) -> FeedResult<QueryPlan> {
    let mut memberships = Memberships::default();

    let profile_id = match (&query.profile_id, query.tab.needs_profile()) {
        (None, true) => {
            debug!("No profile for {} tab, skipping lookups", query.tab);
            return Ok(build_predicate(query, &memberships, now, tz));
        }
        (profile_id, _) => profile_id.as_deref(),
    };

    if !query.tag_filters.is_empty() {
        let tag_ids: Vec<String> = query.tag_filters.iter().cloned().collect();
        let tagged = store.list_event_ids_by_any_tag(&tag_ids).await?;
        let no_match = tagged.is_empty();
        memberships.tagged = Some(tagged.into_iter().collect());
        if no_match {
            return Ok(build_predicate(query, &memberships, now, tz));
        }
    }

    match (query.tab, profile_id) {
        (TabType::Going, Some(profile_id)) => {
            let rsvped = store.list_event_ids_rsvped_by(profile_id).await?;
            memberships.rsvped = Some(rsvped.into_iter().collect());
        }
        (TabType::Hosting, Some(profile_id)) => {
            let co_hosted = store.list_event_ids_co_hosted_by(profile_id).await?;
            memberships.co_hosted = Some(co_hosted.into_iter().collect());
        }
        _ => {}
    }

    Ok(build_predicate(query, &memberships, now, tz))
}

async fn list_page(
    store: &dyn EventStore,
    plan: &QueryPlan,
    tab: TabType,
    page: usize,
    page_size: usize,
) -> FeedResult<FeedPage> {
    let predicate = match plan {
        QueryPlan::Empty(reason) => {
            debug!("Page {} short-circuited: {:?}", page, reason);
            return Ok(FeedPage::empty(page));
        }
        QueryPlan::Filtered(predicate) => predicate,
    };

    let request = PageRequest {
        predicate: predicate.clone(),
        order: sort_order(tab),
        offset: page * page_size,
        limit: page_size,
    };
    let events = store.list_events(&request).await?;
    let has_more = events.len() == page_size;

    Ok(FeedPage {
        events,
        page,
        has_more,
    })
}

async fn count_plan(store: &dyn EventStore, plan: &QueryPlan) -> FeedResult<u64> {
    match plan {
        QueryPlan::Empty(_) => Ok(0),
        QueryPlan::Filtered(predicate) => store.count_events(predicate).await,
    }
}

/// Fetch a single page of `query` without accumulating anything
pub async fn fetch_page(
    store: &dyn EventStore,
    query: &FeedQuery,
    page: usize,
    page_size: usize,
    now: DateTime<Utc>,
    tz: Tz,
) -> FeedResult<FeedPage> {
    let plan = resolve_plan(store, query, now, tz).await?;
    list_page(store, &plan, query.tab, page, page_size).await
}

/// Number of events `query` matches across all pages
pub async fn count_events(
    store: &dyn EventStore,
    query: &FeedQuery,
    now: DateTime<Utc>,
    tz: Tz,
) -> FeedResult<u64> {
    let plan = resolve_plan(store, query, now, tz).await?;
    count_plan(store, &plan).await
}

/// Resolve the plan once, then run the page and count queries side by side.
/// The two results fail independently.
pub async fn fetch_page_with_count(
    store: &dyn EventStore,
    query: &FeedQuery,
    page: usize,
    page_size: usize,
    now: DateTime<Utc>,
    tz: Tz,
) -> (FeedResult<FeedPage>, FeedResult<u64>) {
    let plan = match resolve_plan(store, query, now, tz).await {
        Ok(plan) => plan,
        Err(e) => {
            let message = e.to_string();
            return (Err(e), Err(store_error(&message)));
        }
    };

    futures::join!(
        list_page(store, &plan, query.tab, page, page_size),
        count_plan(store, &plan)
    )
}
