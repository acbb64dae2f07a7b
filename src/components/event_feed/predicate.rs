//! Tab-scoped filter construction shared by the list and count queries.
//!
//! Membership lookups (tags, RSVPs, co-hosts) are resolved before this point;
//! [`build_predicate`] itself is pure so both query shapes always agree on
//! which events match.

use super::models::Event;
use super::query::{FeedQuery, TabType};
use crate::utils::time::{day_bounds, today_bounds};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;

/// How far back `created_at` may lie for the "new" tab
pub const NEW_EVENT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Ordering of a tab: by start date, most recently ended first for "past"
pub fn sort_order(tab: TabType) -> SortOrder {
    match tab {
        TabType::Past => SortOrder::Descending,
        _ => SortOrder::Ascending,
    }
}

/// One filter term. A predicate matches when every clause does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Event id is one of these
    IdIn(BTreeSet<String>),
    /// `from <= start_date <= to`
    StartBetween {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// `start_date > at`
    StartAfter(DateTime<Utc>),
    /// `end_date < at`
    EndBefore(DateTime<Utc>),
    /// `created_at >= since`
    CreatedSince(DateTime<Utc>),
    /// `[start_date, end_date]` intersects `[from, to]`
    Overlaps {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// Created by the profile, or co-hosted by it
    HostedBy {
        profile_id: String,
        co_hosted: BTreeSet<String>,
    },
}

impl Clause {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Clause::IdIn(ids) => ids.contains(&event.id),
            Clause::StartBetween { from, to } => {
                event.start_date >= *from && event.start_date <= *to
            }
            Clause::StartAfter(at) => event.start_date > *at,
            Clause::EndBefore(at) => event.end_date < *at,
            Clause::CreatedSince(since) => event.created_at >= *since,
            Clause::Overlaps { from, to } => event.start_date <= *to && event.end_date >= *from,
            Clause::HostedBy {
                profile_id,
                co_hosted,
            } => event.created_by == *profile_id || co_hosted.contains(&event.id),
        }
    }
}

/// Conjunction of clauses over the joined event set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.clauses.iter().all(|clause| clause.matches(event))
    }

    fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }
}

/// Why a plan short-circuited to no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// `going`/`hosting` without a profile
    MissingProfile,
    /// No event carries any of the requested tags
    NoTaggedEvents,
    /// The profile has not RSVPed to anything
    NoRsvps,
    /// Tag and RSVP id sets do not intersect
    DisjointIds,
}

/// Result of query construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Known to match nothing; no list/count call is needed
    Empty(EmptyReason),
    Filtered(Predicate),
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryPlan::Empty(_))
    }
}

/// Id sets produced by the membership sub-queries. `None` means the lookup
/// was not needed for the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memberships {
    pub tagged: Option<BTreeSet<String>>,
    pub rsvped: Option<BTreeSet<String>>,
    pub co_hosted: Option<BTreeSet<String>>,
}

/// Build the filter for `query` as seen at `now` in `tz`
pub fn build_predicate(
    query: &FeedQuery,
    memberships: &Memberships,
    now: DateTime<Utc>,
    tz: Tz,
) -> QueryPlan {
    let profile_id = match (&query.profile_id, query.tab.needs_profile()) {
        (None, true) => return QueryPlan::Empty(EmptyReason::MissingProfile),
        (profile_id, _) => profile_id.clone(),
    };

    let mut predicate = Predicate::default();
    let mut ids: Option<BTreeSet<String>> = None;

    if !query.tag_filters.is_empty() {
        let tagged = memberships.tagged.clone().unwrap_or_default();
        if tagged.is_empty() {
            return QueryPlan::Empty(EmptyReason::NoTaggedEvents);
        }
        ids = Some(tagged);
    }

    if let Some(date) = query.selected_date {
        let bounds = day_bounds(date, tz);
        predicate.push(Clause::Overlaps {
            from: bounds.start,
            to: bounds.end,
        });
    }

    match query.tab {
        TabType::Today => {
            let bounds = today_bounds(now, tz);
            predicate.push(Clause::StartBetween {
                from: bounds.start,
                to: bounds.end,
            });
        }
        TabType::Upcoming => predicate.push(Clause::StartAfter(now)),
        TabType::Going => {
            let rsvped = memberships.rsvped.clone().unwrap_or_default();
            if rsvped.is_empty() {
                return QueryPlan::Empty(EmptyReason::NoRsvps);
            }
            let restricted = match ids.take() {
                Some(tagged) => tagged.intersection(&rsvped).cloned().collect(),
                None => rsvped,
            };
            if restricted.is_empty() {
                return QueryPlan::Empty(EmptyReason::DisjointIds);
            }
            ids = Some(restricted);
        }
        TabType::Hosting => {
            if let Some(profile_id) = profile_id {
                predicate.push(Clause::HostedBy {
                    profile_id,
                    co_hosted: memberships.co_hosted.clone().unwrap_or_default(),
                });
            }
        }
        TabType::Past => predicate.push(Clause::EndBefore(now)),
        TabType::New => {
            predicate.push(Clause::CreatedSince(now - Duration::hours(NEW_EVENT_WINDOW_HOURS)))
        }
        TabType::All => {}
    }

    if let Some(ids) = ids {
        predicate.clauses.insert(0, Clause::IdIn(ids));
    }

    QueryPlan::Filtered(predicate)
}
