//! Rate-limit response headers and their parsers.
//!
//! The API advertises three windows in each quota header as `short/medium/long`, e.g.
//! `X-RateLimit-Remaining: 299/2999/29999`.

use crate::error::HeaderParseError;
use crate::window::{Quota, QuotaSet};
use chrono::{DateTime, NaiveDateTime};
use http::HeaderMap;
use std::time::SystemTime;

// Lowercase so the names are usable with `HeaderName::from_static`.
pub const RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const DATE: &str = "date";

/// One value per window, in short/medium/long order.
pub type Triplet = [u32; 3];

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, HeaderParseError> {
    headers
        .get(name)
        .ok_or(HeaderParseError::Missing { header: name })?
        .to_str()
        .map_err(|_| HeaderParseError::NotAscii { header: name })
}

/// Parse a `a/b/c` header value into three non-negative integers.
pub fn parse_triplet(name: &'static str, value: &str) -> Result<Triplet, HeaderParseError> {
    let segments: Vec<&str> = value.split('/').map(str::trim).collect();
    if segments.len() != 3 {
        return Err(HeaderParseError::WrongSegmentCount {
            header: name,
            found: segments.len(),
            value: value.to_string(),
        });
    }

    let mut triplet = [0u32; 3];
    for (slot, segment) in triplet.iter_mut().zip(&segments) {
        *slot = segment.parse::<u32>().map_err(|_| HeaderParseError::InvalidSegment {
            header: name,
            segment: (*segment).to_string(),
        })?;
    }
    Ok(triplet)
}

/// Read one quota header from a response.
pub fn triplet_header(headers: &HeaderMap, name: &'static str) -> Result<Triplet, HeaderParseError> {
    parse_triplet(name, header_str(headers, name)?)
}

/// Read all three quota headers. Fails as a unit: either every window parses or none is
/// returned.
pub fn parse_quotas(headers: &HeaderMap) -> Result<QuotaSet, HeaderParseError> {
    let limit = triplet_header(headers, RATELIMIT_LIMIT)?;
    let remaining = triplet_header(headers, RATELIMIT_REMAINING)?;
    let reset = triplet_header(headers, RATELIMIT_RESET)?;

    Ok(QuotaSet {
        short: Quota::new(limit[0], remaining[0], reset[0]),
        medium: Quota::new(limit[1], remaining[1], reset[1]),
        long: Quota::new(limit[2], remaining[2], reset[2]),
    })
}

/// Short-window reset seconds straight from the reset header.
pub fn short_reset_seconds(headers: &HeaderMap) -> Result<u32, HeaderParseError> {
    triplet_header(headers, RATELIMIT_RESET).map(|reset| reset[0])
}

/// Parse the server's `Date` header (RFC 1123, e.g. `Tue, 14 Nov 2023 22:13:20 GMT`).
pub fn parse_date(headers: &HeaderMap) -> Result<SystemTime, HeaderParseError> {
    let value = header_str(headers, DATE)?.trim();

    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Ok(SystemTime::from(date));
    }
    NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
        .map(|naive| SystemTime::from(naive.and_utc()))
        .map_err(|_| HeaderParseError::InvalidDate { header: DATE, value: value.to_string() })
}

/// Format an instant as an HTTP date, the inverse of [`parse_date`].
pub fn format_date(at: SystemTime) -> String {
    DateTime::<chrono::Utc>::from(at).format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
