use regex::{Regex, RegexBuilder};
use tracing::warn;
use waypoint_core::NormalizedPath;

/// Path prefixes owned by the hosting platform; misses there are never
/// recorded.
pub const PLATFORM_PREFIXES: [&str; 4] = ["/_admin/", "/_internal/", "/static/", "/.well-known/"];

/// Suffixes of assets that are not pages.
pub const IGNORED_EXTENSIONS: [&str; 7] = [".map", ".php", ".xml", ".txt", ".ico", ".css", ".js"];

/// Decides which not-found paths are not worth recording.
///
/// Checks run in order and stop at the first hit: platform prefixes, asset
/// extensions, then the operator's wildcard patterns.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    source: String,
    patterns: Vec<Regex>,
}

impl ExclusionPolicy {
    /// Compiles newline-separated operator patterns.
    ///
    /// Lines are trimmed and blank lines dropped. `*` matches any run of
    /// characters; everything else is literal. Each pattern must match the
    /// whole path, ignoring case.
    pub fn parse(source: &str) -> Self {
        let patterns = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match wildcard_to_regex(line) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!(pattern = line, error = %err, "dropping exclusion pattern");
                    None
                }
            })
            .collect();

        Self {
            source: source.to_string(),
            patterns,
        }
    }

    /// The text this policy was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_excluded(&self, path: &NormalizedPath) -> bool {
        let path = path.as_str();

        PLATFORM_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
            || IGNORED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
            || self.patterns.iter().any(|re| re.is_match(path))
    }
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::parse("")
    }
}

fn wildcard_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    RegexBuilder::new(&format!("^{body}$"))
        .case_insensitive(true)
        .build()
}
