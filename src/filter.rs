//! Compiles extracted date bounds into the index's native range filter.
//!
//! Each bound is validated independently: a bound that fails to parse as a
//! `YYYY-MM-DD` calendar date is dropped (logged, never an error) and the
//! remaining bound still applies. Zero valid bounds compile to no filter at
//! all, so the search runs unconstrained by date.

use chrono::NaiveDate;

use crate::models::DateFilter;

/// A scalar range constraint on an article's indexed publication date.
///
/// Both bounds are inclusive: `gte` keeps articles dated on-or-after,
/// `lte` keeps articles dated on-or-before. At least one bound is always
/// present — an empty range is represented as `None` at the compile step,
/// never as a present-but-empty filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub gte: Option<NaiveDate>,
    pub lte: Option<NaiveDate>,
}

impl DateRange {
    /// Unix timestamp of midnight UTC on the `gte` date, if set.
    pub fn gte_timestamp(&self) -> Option<i64> {
        self.gte.map(midnight_utc)
    }

    /// Unix timestamp of midnight UTC on the `lte` date, if set.
    pub fn lte_timestamp(&self) -> Option<i64> {
        self.lte.map(midnight_utc)
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

/// Parse a `YYYY-MM-DD` string into a calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Compiles a raw [`DateFilter`] into the index's range representation.
///
/// Invalid bounds are dropped silently (with a warning log); if neither
/// bound survives, returns `None` so the search is unconstrained.
pub fn compile(filter: &DateFilter) -> Option<DateRange> {
    let gte = filter.gte.as_deref().and_then(|s| {
        let parsed = parse_date(s);
        if parsed.is_none() {
            tracing::warn!(value = s, "dropping invalid gte date bound");
        }
        parsed
    });

    let lte = filter.lte.as_deref().and_then(|s| {
        let parsed = parse_date(s);
        if parsed.is_none() {
            tracing::warn!(value = s, "dropping invalid lte date bound");
        }
        parsed
    });

    if gte.is_none() && lte.is_none() {
        return None;
    }

    Some(DateRange { gte, lte })
}
