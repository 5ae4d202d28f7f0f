use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A request path with query string and fragment removed.
///
/// This is the only form ever compared against exact rule sources and the
/// only form stored as a 404 url. Normalizing an already normalized path
/// returns it unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    /// Normalizes a raw request target.
    ///
    /// Accepts origin-form targets (`/a/b?x=1#top`) as well as absolute URLs
    /// (`https://host/a/b?x=1`), which are reduced to their path. An empty
    /// path becomes `/`.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();

        if raw.contains("://") {
            if let Ok(parsed) = url::Url::parse(raw) {
                return Self::from_path(parsed.path());
            }
        }

        let end = raw.find(['?', '#']).unwrap_or(raw.len());
        Self::from_path(&raw[..end])
    }

    fn from_path(path: &str) -> Self {
        if path.is_empty() {
            Self("/".to_string())
        } else {
            Self(path.to_string())
        }
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_query_and_fragment() {
        assert_eq!(NormalizedPath::new("/old?utm=1").as_str(), "/old");
        assert_eq!(NormalizedPath::new("/old#section").as_str(), "/old");
        assert_eq!(NormalizedPath::new("/old?a=1#frag").as_str(), "/old");
    }

    #[test]
    fn fragment_before_query_marker() {
        assert_eq!(NormalizedPath::new("/page#a?b").as_str(), "/page");
    }

    #[test]
    fn empty_becomes_root() {
        assert_eq!(NormalizedPath::new("").as_str(), "/");
        assert_eq!(NormalizedPath::new("?only=query").as_str(), "/");
    }

    #[test]
    fn absolute_url_reduces_to_path() {
        assert_eq!(
            NormalizedPath::new("https://example.com/blog/post?x=1").as_str(),
            "/blog/post"
        );
        assert_eq!(NormalizedPath::new("https://example.com").as_str(), "/");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["/a/b?c=d", "/x#y", "", "https://h/p?q", "/plain/path/"] {
            let once = NormalizedPath::new(raw);
            let twice = NormalizedPath::new(once.as_str());
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn trailing_slash_is_preserved() {
        assert_eq!(NormalizedPath::new("/dir/").as_str(), "/dir/");
    }
}
