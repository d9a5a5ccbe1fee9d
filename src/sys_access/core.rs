//! Hide / deny / index pattern evaluation against URL paths.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid {kind} pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub kind: &'static str,
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// The three optional patterns. An unset pattern never matches.
///
/// - `hide`: excluded from listings, still directly reachable.
/// - `deny`: excluded from listings and forbidden on direct access.
/// - `index`: served in place of its directory's listing.
#[derive(Debug, Clone, Default)]
pub struct AccessPatterns {
    hide: Option<Regex>,
    deny: Option<Regex>,
    index: Option<Regex>,
}

impl AccessPatterns {
    /// Compile from flag strings; an empty string leaves that pattern unset.
    pub fn compile(hide: &str, deny: &str, index: &str) -> Result<Self, PatternError> {
        Ok(Self {
            hide: compile_optional("hide", hide)?,
            deny: compile_optional("deny", deny)?,
            index: compile_optional("index", index)?,
        })
    }

    /// Whether the path is left out of directory listings.
    pub fn is_hidden(&self, path: &str) -> bool {
        regex_match(self.hide.as_ref(), path) || regex_match(self.deny.as_ref(), path)
    }

    /// Whether direct access to the path is forbidden.
    pub fn is_denied(&self, path: &str) -> bool {
        regex_match(self.deny.as_ref(), path)
    }

    pub fn is_index(&self, path: &str) -> bool {
        regex_match(self.index.as_ref(), path)
    }
}

fn compile_optional(kind: &'static str, pattern: &str) -> Result<Option<Regex>, PatternError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern).map(Some).map_err(|source| PatternError {
        kind,
        pattern: pattern.to_string(),
        source,
    })
}

/// Same as `rx.is_match(s)`, but false when the pattern is unset.
pub fn regex_match(rx: Option<&Regex>, s: &str) -> bool {
    rx.is_some_and(|rx| rx.is_match(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_HIDE: &str = "/[.][^/]+/?$";

    #[test]
    fn unset_patterns_match_nothing() {
        let p = AccessPatterns::default();
        for path in ["/", "/.git/", "/a.txt", "/index.html"] {
            assert!(!p.is_hidden(path));
            assert!(!p.is_denied(path));
            assert!(!p.is_index(path));
        }
    }

    #[test]
    fn hide_only_affects_listing() {
        let p = AccessPatterns::compile(DEFAULT_HIDE, "", "").unwrap();
        assert!(p.is_hidden("/.git"));
        assert!(p.is_hidden("/sub/.env"));
        assert!(!p.is_denied("/.git"));
        assert!(!p.is_hidden("/a.txt"));
    }

    #[test]
    fn deny_implies_hidden() {
        let p = AccessPatterns::compile("", "^/secret(/|$)", "").unwrap();
        for path in ["/secret", "/secret/", "/secret/key.pem"] {
            assert!(p.is_denied(path), "{path} should be denied");
            assert!(p.is_hidden(path), "{path} should be hidden");
        }
        assert!(!p.is_denied("/secrets.txt"));
    }

    #[test]
    fn hidden_is_union_of_hide_and_deny() {
        let p = AccessPatterns::compile("[.]bak$", "[.]key$", "").unwrap();
        for path in ["/a.bak", "/a.key", "/a.txt"] {
            let want = p.is_denied(path) || path.ends_with(".bak");
            assert_eq!(p.is_hidden(path), want, "{path}");
        }
    }

    #[test]
    fn invalid_pattern_names_its_kind() {
        let err = AccessPatterns::compile("", "", "(").unwrap_err();
        assert_eq!(err.kind, "index");
        assert_eq!(err.pattern, "(");
    }
}
