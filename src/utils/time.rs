use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex};

/// Source of "now" for feed predicates
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Inclusive instant range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Calendar day containing `now` in `tz`
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// 00:00:00.000 through 23:59:59.999 of `date` in `tz` wall-clock terms
pub fn day_bounds(date: NaiveDate, tz: Tz) -> DayBounds {
    let start = date.and_time(NaiveTime::MIN);
    let end = start + Duration::days(1) - Duration::milliseconds(1);

    DayBounds {
        start: resolve_local(tz, start, true),
        end: resolve_local(tz, end, false),
    }
}

/// Bounds of the local day containing `now`
pub fn today_bounds(now: DateTime<Utc>, tz: Tz) -> DayBounds {
    day_bounds(local_date(now, tz), tz)
}

// Ambiguous times pick the widest reading; times inside a DST gap move
// towards the inside of the day until they exist.
fn resolve_local(tz: Tz, naive: NaiveDateTime, is_start: bool) -> DateTime<Utc> {
    let mut candidate = naive;
    for _ in 0..4 {
        let local = tz.from_local_datetime(&candidate);
        let resolved = if is_start {
            local.earliest()
        } else {
            local.latest()
        };
        if let Some(dt) = resolved {
            return dt.with_timezone(&Utc);
        }
        candidate = if is_start {
            candidate + Duration::minutes(30)
        } else {
            candidate - Duration::minutes(30)
        };
    }

    // No zone has a gap longer than two hours
    Utc.from_utc_datetime(&naive)
}
