//! Persisted entities and the value types that move them in and out of a store.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Identifier of a [`RedirectRule`], assigned by the store.
///
/// Ids increase monotonically, so ascending id order is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u64);

/// Identifier of a [`NotFoundRecord`], assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotFoundId(pub u64);

impl Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for NotFoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the stored string form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant::new($kind, other)),
                }
            }
        }
    };
}

/// How a rule's `source` is compared against the request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Exact,
    Regex,
}

string_enum!(MatchType, "match type", { Exact => "exact", Regex => "regex" });

/// Whether a rule participates in matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Active,
    #[default]
    Inactive,
}

string_enum!(RuleStatus, "rule status", { Active => "active", Inactive => "inactive" });

/// Triage state of a [`NotFoundRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundStatus {
    #[default]
    New,
    Ignored,
    Redirected,
}

string_enum!(NotFoundStatus, "404 status", {
    New => "new",
    Ignored => "ignored",
    Redirected => "redirected",
});

/// HTTP status emitted for a redirect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum RedirectType {
    /// 301 Moved Permanently.
    #[default]
    Permanent,
    /// 302 Found.
    Found,
    /// 307 Temporary Redirect.
    Temporary,
}

impl RedirectType {
    /// Returns the HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            RedirectType::Permanent => 301,
            RedirectType::Found => 302,
            RedirectType::Temporary => 307,
        }
    }

    /// Maps a status code to a redirect type, or `None` for unsupported codes.
    pub fn from_status_code(code: u16) -> Option<Self> {
        match code {
            301 => Some(RedirectType::Permanent),
            302 => Some(RedirectType::Found),
            307 => Some(RedirectType::Temporary),
            _ => None,
        }
    }
}

impl From<RedirectType> for u16 {
    fn from(value: RedirectType) -> Self {
        value.status_code()
    }
}

impl TryFrom<u16> for RedirectType {
    type Error = UnknownVariant;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        RedirectType::from_status_code(code)
            .ok_or_else(|| UnknownVariant::new("redirect type", code.to_string()))
    }
}

impl Display for RedirectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

/// A stored redirect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub id: RuleId,
    /// Literal path for exact rules, pattern for regex rules.
    pub source: String,
    /// Target URL. For regex rules this is a template that may reference
    /// capture groups (`$1`, `${name}`).
    pub destination: String,
    pub match_type: MatchType,
    pub redirect_type: RedirectType,
    pub hit_count: u64,
    pub status: RuleStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RedirectRule {
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }
}

/// Unvalidated rule input coming from the management plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub source: String,
    pub destination: String,
    /// Defaults to [`MatchType::Exact`] when absent.
    #[serde(default)]
    pub match_type: Option<MatchType>,
    /// Raw status code; anything outside 301/302/307 falls back to 301.
    #[serde(default)]
    pub redirect_type: Option<u16>,
    /// Rules are inactive unless explicitly activated.
    #[serde(default)]
    pub active: bool,
}

/// Rule fields after validation and normalization, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRule {
    pub(crate) source: String,
    pub(crate) destination: String,
    pub(crate) match_type: MatchType,
    pub(crate) redirect_type: RedirectType,
    pub(crate) status: RuleStatus,
}

impl ValidatedRule {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn redirect_type(&self) -> RedirectType {
        self.redirect_type
    }

    pub fn status(&self) -> RuleStatus {
        self.status
    }
}

/// A broken-link observation aggregated per distinct url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundRecord {
    pub id: NotFoundId,
    /// Normalized request path; unique across records.
    pub url: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    /// Salted one-way hash of the client address of the latest miss.
    pub ip_hash: Option<String>,
    pub hit_count: u64,
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub status: NotFoundStatus,
}

/// One miss to be folded into the [`NotFoundRecord`] for its url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundObservation {
    pub url: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub ip_hash: Option<String>,
    pub seen_at: Timestamp,
}

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Column a rule listing is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSort {
    Source,
    HitCount,
    UpdatedAt,
    #[default]
    CreatedAt,
}

/// Column a 404 listing is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundSort {
    Url,
    #[default]
    HitCount,
    FirstSeen,
    LastSeen,
}

/// Offset pagination shared by both listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 500;

    /// Creates a pagination window, clamping both values into a sane range.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Filter, search, sort and pagination for rule listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleQuery {
    pub status: Option<RuleStatus>,
    pub match_type: Option<MatchType>,
    /// Case-insensitive substring over source and destination.
    pub search: Option<String>,
    pub sort: RuleSort,
    pub order: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl RuleQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

impl Default for RuleQuery {
    fn default() -> Self {
        let pagination = Pagination::default();
        Self {
            status: None,
            match_type: None,
            search: None,
            sort: RuleSort::default(),
            order: SortOrder::default(),
            page: pagination.page,
            per_page: pagination.per_page,
        }
    }
}

/// Filter, search, sort and pagination for 404 listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotFoundQuery {
    pub status: Option<NotFoundStatus>,
    /// Case-insensitive substring over url and referrer.
    pub search: Option<String>,
    pub sort: NotFoundSort,
    pub order: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl NotFoundQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

impl Default for NotFoundQuery {
    fn default() -> Self {
        let pagination = Pagination::default();
        Self {
            status: None,
            search: None,
            sort: NotFoundSort::default(),
            order: SortOrder::default(),
            page: pagination.page,
            per_page: pagination.per_page,
        }
    }
}

/// One page of a listing together with the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Rule aggregates used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub total_hits: u64,
    /// Hits of active permanent (301) rules.
    pub saved_visits: u64,
}

/// 404 aggregates used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotFoundStats {
    pub total: u64,
    pub new: u64,
    pub ignored: u64,
    pub redirected: u64,
    pub total_hits: u64,
    /// Hits of records still in the `new` state.
    pub unhandled_hits: u64,
}
