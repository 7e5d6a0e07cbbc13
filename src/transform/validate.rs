//! Field validation and normalization shared by the dimension transforms

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{AcquisitionSource, ContentKey, Platform};
use crate::table::RowView;

/// Email pattern, also enforced by the PostgreSQL warehouse
pub const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

pub const MAX_EMOJI_CHARS: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("valid regex"));

static INSTAGRAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(?:p|reel|reels|tv)/([A-Za-z0-9_-]+)").expect("valid regex"));

static TIKTOK_VIDEO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/video/(\d+)").expect("valid regex"));

static SHORT_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z0-9_-]+)").expect("valid regex"));

static YOUTUBE_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(?:shorts|embed|live)/([A-Za-z0-9_-]+)").expect("valid regex"));

static YOUTUBE_QUERY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|&)v=([A-Za-z0-9_-]+)").expect("valid regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Lower-case, spaces and hyphens to underscores; unknown values become `other`.
pub fn normalize_acquisition_source(raw: &str) -> Option<AcquisitionSource> {
    let normalized: String = raw
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    if normalized.is_empty() {
        return None;
    }
    Some(AcquisitionSource::parse(&normalized).unwrap_or(AcquisitionSource::Other))
}

/// Split a URL into lower-cased host (without `www.`/`m.`), path and query.
fn split_url(url: &str) -> Option<(String, &str, &str)> {
    let rest = url.trim().split_once("://").map_or(url.trim(), |(_, r)| r);
    let (authority, tail) = match rest.find(['/', '?', '#']) {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let tail = tail.split('#').next().unwrap_or_default();
    let (path, query) = tail.split_once('?').unwrap_or((tail, ""));

    let host = authority
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .map(str::to_string)
        .unwrap_or(host);
    Some((host, path, query))
}

fn host_is(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Derive the content natural key from its URL.
pub fn parse_content_url(url: &str) -> Result<ContentKey, String> {
    let (host, path, query) =
        split_url(url).ok_or_else(|| format!("unparseable content url '{url}'"))?;

    let (platform, id) = if host_is(&host, "instagram.com") {
        let id = INSTAGRAM_RE.captures(path).map(|c| c[1].to_string());
        (Platform::Instagram, id)
    } else if host == "vm.tiktok.com" || host == "vt.tiktok.com" {
        let id = SHORT_PATH_RE.captures(path).map(|c| c[1].to_string());
        (Platform::Tiktok, id)
    } else if host_is(&host, "tiktok.com") {
        let id = TIKTOK_VIDEO_RE.captures(path).map(|c| c[1].to_string());
        (Platform::Tiktok, id)
    } else if host == "youtu.be" {
        let id = SHORT_PATH_RE.captures(path).map(|c| c[1].to_string());
        (Platform::Youtube, id)
    } else if host_is(&host, "youtube.com") {
        let id = if path == "/watch" {
            YOUTUBE_QUERY_RE.captures(query).map(|c| c[1].to_string())
        } else {
            YOUTUBE_PATH_RE.captures(path).map(|c| c[1].to_string())
        };
        (Platform::Youtube, id)
    } else {
        return Err(format!("unsupported platform '{host}'"));
    };

    match id {
        Some(platform_id) => Ok(ContentKey {
            platform,
            platform_id,
        }),
        None => Err(format!("no {platform} id in url '{url}'")),
    }
}

/// Optional float column constrained to `[min, max]`.
///
/// NULL passes through; a value that is present but unparseable or out of
/// range is an error.
pub fn bounded_float(
    row: &RowView<'_>,
    column: &str,
    min: f64,
    max: f64,
) -> Result<Option<f64>, String> {
    if row.get(column).is_none() {
        return Ok(None);
    }
    match row.float(column) {
        Some(v) if v.is_finite() && (min..=max).contains(&v) => Ok(Some(v)),
        Some(v) => Err(format!("{column} {v} outside [{min}, {max}]")),
        None => Err(format!("{column} is not a number")),
    }
}

/// Optional non-negative integer column
pub fn non_negative_int(row: &RowView<'_>, column: &str) -> Result<Option<i64>, String> {
    if row.get(column).is_none() {
        return Ok(None);
    }
    match row.int(column) {
        Some(v) if v >= 0 => Ok(Some(v)),
        Some(v) => Err(format!("{column} {v} is negative")),
        None => Err(format!("{column} is not an integer")),
    }
}

pub fn emoji_fits(emoji: &str) -> bool {
    (1..=MAX_EMOJI_CHARS).contains(&emoji.chars().count())
}
