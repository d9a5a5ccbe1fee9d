//! Pure URL-path logic: cleaning, trailing-slash intent, and segment encoding.

use std::fmt;

/// A cleaned, absolute, slash-delimited request path.
///
/// Always starts with `/`, never holds `.` or `..` segments, and keeps a
/// trailing slash only when the raw path carried one (directory intent).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestPath(String);

impl RequestPath {
    /// Normalize a decoded URL path. Never fails; garbage cleans to `/`.
    pub fn normalize(raw: &str) -> Self {
        let had_slash_suffix = raw.ends_with('/');
        let mut cleaned = clean(raw);
        if had_slash_suffix && !cleaned.ends_with('/') {
            cleaned.push('/');
        }
        Self(cleaned)
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_trailing_slash(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Last element of the path, ignoring a trailing slash. `/` for the root.
    pub fn base(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rsplit('/').next() {
            Some(last) if !last.is_empty() => last,
            _ => "/",
        }
    }

    /// Name of the entry relative to the served root, as the filesystem
    /// layer expects it: `.` for the root, `a/b` for `/a/b/`.
    pub fn fs_name(&self) -> String {
        let trimmed = self.0.trim_matches('/');
        if trimmed.is_empty() {
            ".".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// URL path of a child entry, without any trailing slash.
    pub fn join_entry(&self, name: &str) -> RequestPath {
        let parent = self.0.trim_end_matches('/');
        RequestPath(format!("{parent}/{name}"))
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexical cleaning: collapse separators, drop `.`, resolve `..`.
/// The result is rooted and has no trailing slash (except `/` itself).
pub fn clean(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            s => stack.push(s),
        }
    }
    format!("/{}", stack.join("/"))
}

/// Percent-encode every segment of a relative URL, keeping the slashes.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
