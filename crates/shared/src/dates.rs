//! Date parsing and display for feed-provided date strings.
//!
//! Feeds publish dates in several shapes. Everything parses to a
//! timezone-aware timestamp; text without an offset is taken as UTC and
//! text that matches nothing becomes "now" so it still sorts.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::models::Article;

/// Formats that carry their own numeric offset.
const OFFSET_FORMATS: &[&str] = &["%a, %d %b %Y %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%z"];

/// Formats without an offset; interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%d %H:%M:%S"];

pub fn parse_date(s: &str) -> DateTime<FixedOffset> {
    parse_date_at(s, Utc::now())
}

/// Like [`parse_date`] with an explicit "now" for the fallback.
pub fn parse_date_at(s: &str, now: DateTime<Utc>) -> DateTime<FixedOffset> {
    try_parse_date(s).unwrap_or_else(|| now.fixed_offset())
}

pub fn try_parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    if let Some(dt) = parse_named_zone(s) {
        return Some(dt);
    }

    NAIVE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(s, fmt)
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

/// RFC 822 style dates ending in a zone abbreviation, e.g. `... 10:00:00 PDT`.
fn parse_named_zone(s: &str) -> Option<DateTime<FixedOffset>> {
    let (rest, zone) = s.rsplit_once(' ')?;
    let hours = match zone.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "UT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    let naive = NaiveDateTime::parse_from_str(rest.trim(), "%a, %d %b %Y %H:%M:%S").ok()?;
    let offset = FixedOffset::east_opt(hours * 3600)?;
    naive.and_local_timezone(offset).single()
}

/// Render a date as "just now", "5 minutes ago", ... or an absolute short date.
pub fn format_relative(s: &str) -> String {
    format_relative_at(s, Utc::now())
}

pub fn format_relative_at(s: &str, now: DateTime<Utc>) -> String {
    let dt = parse_date_at(s, now);
    let diff = now.signed_duration_since(dt.with_timezone(&Utc));

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        ago(diff.num_minutes(), "minute")
    } else if diff.num_days() < 1 {
        ago(diff.num_hours(), "hour")
    } else if diff.num_days() < 7 {
        ago(diff.num_days(), "day")
    } else {
        dt.format("%b %d, %Y").to_string()
    }
}

fn ago(count: i64, unit: &str) -> String {
    let suffix = if count > 1 { "s" } else { "" };
    format!("{} {}{} ago", count, unit, suffix)
}

/// Stable sort by published date, newest first unless `ascending`.
pub fn sort_by_date(articles: Vec<Article>, ascending: bool) -> Vec<Article> {
    sort_by_date_at(articles, ascending, Utc::now())
}

pub fn sort_by_date_at(articles: Vec<Article>, ascending: bool, now: DateTime<Utc>) -> Vec<Article> {
    let mut keyed: Vec<(DateTime<FixedOffset>, Article)> = articles
        .into_iter()
        .map(|article| (parse_date_at(&article.published, now), article))
        .collect();

    if ascending {
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
    } else {
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
    }

    keyed.into_iter().map(|(_, article)| article).collect()
}
