//! Query/filter translation.
//!
//! Turns raw page-request parameters into a store query. The policy is
//! deliberately lenient: bad values fall back to defaults instead of
//! rejecting the request, which suits an internal dashboard.

use chrono::{DateTime, NaiveDate, NaiveTime};

use crate::models::AlertFilter;

/// Default page size when `limit` is absent or unusable
pub const DEFAULT_LIMIT: usize = 50;

/// Raw page-request parameters, exactly as received on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub level: Option<String>,
    pub agent: Option<String>,
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Sanitized page request ready for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub limit: usize,
    pub offset: usize,
    pub filter: AlertFilter,
}

impl PageRequest {
    /// Sanitize into a store query. Unparseable or negative `limit`/`offset`
    /// silently become the defaults; an unparseable `level` means no level
    /// filter, not an error.
    #[must_use]
    pub fn sanitize(&self) -> PageQuery {
        let limit = parse_non_negative(self.limit.as_deref()).unwrap_or(DEFAULT_LIMIT);
        let offset = parse_non_negative(self.offset.as_deref()).unwrap_or(0);

        let filter = AlertFilter {
            level: self
                .level
                .as_deref()
                .map(str::trim)
                .and_then(|raw| raw.parse::<i64>().ok()),
            agent: normalized(self.agent.as_deref()),
            search: normalized(self.search.as_deref()),
            since_ms: self
                .start_date
                .as_deref()
                .and_then(|raw| parse_date_ms(raw, DayEdge::Start)),
            until_ms: self
                .end_date
                .as_deref()
                .and_then(|raw| parse_date_ms(raw, DayEdge::End)),
        };

        PageQuery {
            limit,
            offset,
            filter,
        }
    }
}

fn parse_non_negative(raw: Option<&str>) -> Option<usize> {
    raw.map(str::trim).and_then(|value| value.parse::<usize>().ok())
}

fn normalized(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

#[derive(Clone, Copy)]
enum DayEdge {
    Start,
    End,
}

/// Accept an RFC 3339 instant, or a bare `YYYY-MM-DD` expanded to the
/// start or end of that day (the dashboard sends bare dates from its
/// period picker).
fn parse_date_ms(raw: &str, edge: DayEdge) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.timestamp_millis());
    }

    let date = raw.parse::<NaiveDate>().ok()?;
    let time = match edge {
        DayEdge::Start => NaiveTime::MIN,
        DayEdge::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?,
    };
    Some(date.and_time(time).and_utc().timestamp_millis())
}
