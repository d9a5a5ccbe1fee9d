//! Conditional-GET and byte-range decisions. No hyper types here.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{sys_access::core::AccessPatterns, sys_path::core::RequestPath};

/// Bytes of content inspected when the extension does not give a type.
pub const SNIFF_LEN: usize = 512;

/// Whether a file reached by `path` should instead redirect to its
/// directory (`./`), so an index file has a single canonical URL.
pub fn redirects_to_directory(
    patterns: &AccessPatterns,
    path: &RequestPath,
    allow_redirect: bool,
) -> bool {
    allow_redirect && patterns.is_index(path.as_str())
}

/// An inclusive-exclusive byte span `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub len: u64,
}

impl ByteRange {
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.start + self.len - 1, size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeDecision {
    /// Serve the whole content with 200.
    Full,
    /// Serve one span with 206.
    Partial(ByteRange),
    /// Serve several spans with 206 as `multipart/byteranges`.
    Multipart(Vec<ByteRange>),
    /// Reply 416.
    Unsatisfiable,
}

/// Interpret a `Range` header against content of `size` bytes.
///
/// Spans starting past the end are dropped; if none is left the request is
/// unsatisfiable. Ranges that together ask for more than the whole content
/// are answered with the full content instead.
pub fn parse_range(header: Option<&str>, size: u64) -> RangeDecision {
    let Some(header) = header else {
        return RangeDecision::Full;
    };
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeDecision::Unsatisfiable;
    };

    let mut ranges = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((start, end)) = part.split_once('-') else {
            return RangeDecision::Unsatisfiable;
        };
        let (start, end) = (start.trim(), end.trim());
        let range = if start.is_empty() {
            // Suffix form: the last N bytes.
            let Ok(n) = end.parse::<u64>() else {
                return RangeDecision::Unsatisfiable;
            };
            if n == 0 {
                None
            } else {
                let n = n.min(size);
                Some(ByteRange {
                    start: size - n,
                    len: n,
                })
            }
        } else {
            let Ok(first) = start.parse::<u64>() else {
                return RangeDecision::Unsatisfiable;
            };
            let last = if end.is_empty() {
                size.saturating_sub(1)
            } else {
                match end.parse::<u64>() {
                    Ok(last) if last >= first => last.min(size.saturating_sub(1)),
                    _ => return RangeDecision::Unsatisfiable,
                }
            };
            if first >= size {
                None
            } else {
                Some(ByteRange {
                    start: first,
                    len: last - first + 1,
                })
            }
        };
        ranges.push(range);
    }

    let satisfiable: Vec<ByteRange> = ranges.into_iter().flatten().collect();
    match satisfiable.as_slice() {
        [] => RangeDecision::Unsatisfiable,
        [only] => RangeDecision::Partial(*only),
        _ if satisfiable.iter().map(|r| r.len).sum::<u64>() > size => RangeDecision::Full,
        _ => RangeDecision::Multipart(satisfiable),
    }
}

/// Layout of a `multipart/byteranges` body: each part's header block
/// followed by its span of the content, then the closing delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPlan {
    pub boundary: String,
    pub parts: Vec<(String, ByteRange)>,
    pub trailer: String,
}

impl MultipartPlan {
    pub fn new(boundary: String, ranges: &[ByteRange], content_type: &str, size: u64) -> Self {
        let parts = ranges
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let lead = if i == 0 { "" } else { "\r\n" };
                let header = format!(
                    "{lead}--{boundary}\r\nContent-Range: {}\r\nContent-Type: {content_type}\r\n\r\n",
                    r.content_range(size)
                );
                (header, *r)
            })
            .collect();
        let trailer = format!("\r\n--{boundary}--\r\n");
        Self {
            boundary,
            parts,
            trailer,
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    /// Exact body length, headers and delimiters included.
    pub fn content_length(&self) -> u64 {
        let parts: u64 = self
            .parts
            .iter()
            .map(|(header, r)| header.len() as u64 + r.len)
            .sum();
        parts + self.trailer.len() as u64
    }
}

/// Random multipart boundary: 60 hex digits.
pub fn new_boundary() -> String {
    rand::random::<[u8; 30]>()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Proceed,
    NotModified,
    Failed,
}

/// Evaluate `If-Unmodified-Since` then `If-Modified-Since` at second
/// granularity. Unknown modification times (the epoch) never match.
pub fn check_preconditions(
    is_get_or_head: bool,
    if_unmodified_since: Option<&str>,
    if_modified_since: Option<&str>,
    modified: SystemTime,
) -> Precondition {
    if is_unknown(modified) {
        return Precondition::Proceed;
    }
    let modified = truncate_secs(modified);
    if let Some(since) = if_unmodified_since.and_then(parse_http_date) {
        if modified > since {
            return Precondition::Failed;
        }
    }
    if is_get_or_head {
        if let Some(since) = if_modified_since.and_then(parse_http_date) {
            if modified <= since {
                return Precondition::NotModified;
            }
        }
    }
    Precondition::Proceed
}

/// A `Range` is only honoured if `If-Range` is absent or names the current
/// modification time. Entity tags are never generated, so they never match.
pub fn if_range_allows(if_range: Option<&str>, modified: SystemTime) -> bool {
    match if_range {
        None => true,
        Some(v) if v.trim_start().starts_with('"') || v.trim_start().starts_with("W/") => false,
        Some(v) => match parse_http_date(v) {
            Some(date) => !is_unknown(modified) && truncate_secs(modified) == date,
            None => false,
        },
    }
}

pub fn format_http_date(t: SystemTime) -> String {
    DateTime::<Utc>::from(t)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

pub fn parse_http_date(s: &str) -> Option<SystemTime> {
    let s = s.trim();
    let utc = DateTime::parse_from_rfc2822(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%a, %d %b %Y %H:%M:%S GMT")
                .ok()
                .map(|n| n.and_utc())
        })?;
    let secs = u64::try_from(utc.timestamp()).ok()?;
    Some(UNIX_EPOCH + Duration::from_secs(secs))
}

pub fn is_unknown(t: SystemTime) -> bool {
    t == UNIX_EPOCH
}

fn truncate_secs(t: SystemTime) -> SystemTime {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => UNIX_EPOCH + Duration::from_secs(d.as_secs()),
        Err(_) => UNIX_EPOCH,
    }
}

/// Content type from the extension of `path`, falling back to a look at
/// the first bytes of the content.
pub fn content_type(path: &str, head: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        let needs_charset = mime.type_() == mime_guess::mime::TEXT
            && mime.get_param(mime_guess::mime::CHARSET).is_none();
        return if needs_charset {
            format!("{mime}; charset=utf-8")
        } else {
            mime.to_string()
        };
    }
    if looks_like_text(head) {
        "text/plain; charset=utf-8".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut off at the end of the sniffed prefix.
        Err(e) => e.error_len().is_none() && head.len() >= SNIFF_LEN,
    }
}
