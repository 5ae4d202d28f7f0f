use crate::model::{MatchType, RedirectType, RuleDraft, RuleStatus, ValidatedRule};
use crate::path::NormalizedPath;
use crate::pattern::{self, CompiledPattern, MatchBudget, MAX_PATTERN_LENGTH};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;
use url::Url;

/// A single rule invariant a draft failed to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Violation {
    SourceRequired,
    SourceNotRootRelative,
    DestinationRequired,
    SelfLoop,
    InvalidPattern { reason: String },
    PatternTooLong { length: usize, max: usize },
    DangerousPattern,
    InvalidDestination { reason: String },
}

impl Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::SourceRequired => f.write_str("source URL is required"),
            Violation::SourceNotRootRelative => {
                f.write_str("source URL must be a path starting with '/'")
            }
            Violation::DestinationRequired => f.write_str("destination URL is required"),
            Violation::SelfLoop => f.write_str("source and destination URLs cannot be the same"),
            Violation::InvalidPattern { reason } => {
                write!(f, "invalid regular expression pattern: {reason}")
            }
            Violation::PatternTooLong { length, max } => {
                write!(f, "regex pattern is too long ({length} characters, max {max})")
            }
            Violation::DangerousPattern => f.write_str(
                "regex pattern may cause catastrophic backtracking; simplify nested quantifiers",
            ),
            Violation::InvalidDestination { reason } => {
                write!(f, "destination is not a valid URL: {reason}")
            }
        }
    }
}

/// Every violation found in a rejected draft.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rule validation failed: {}", join(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn contains(&self, violation: &Violation) -> bool {
        self.violations.contains(violation)
    }
}

/// Validates and normalizes a draft with the default [`MatchBudget`].
pub fn validate_rule(draft: &RuleDraft) -> Result<ValidatedRule, ValidationError> {
    validate_rule_with_budget(draft, &MatchBudget::default())
}

/// Validates and normalizes a draft, collecting every violation.
pub fn validate_rule_with_budget(
    draft: &RuleDraft,
    budget: &MatchBudget,
) -> Result<ValidatedRule, ValidationError> {
    let source = draft.source.trim();
    let destination = draft.destination.trim();
    let match_type = draft.match_type.unwrap_or_default();
    let mut violations = Vec::new();

    if source.is_empty() {
        violations.push(Violation::SourceRequired);
    }
    if destination.is_empty() {
        violations.push(Violation::DestinationRequired);
    }

    // exact sources are compared in the form requests are matched in
    let source = match match_type {
        MatchType::Exact if !source.is_empty() => NormalizedPath::new(source).into_string(),
        _ => source.to_string(),
    };

    if match_type == MatchType::Regex && !source.is_empty() {
        violations.extend(check_regex_source(&source, budget));
    }

    if match_type == MatchType::Exact && !source.is_empty() && !source.starts_with('/') {
        violations.push(Violation::SourceNotRootRelative);
    }

    if !source.is_empty() && is_self_loop(&source, destination, match_type) {
        violations.push(Violation::SelfLoop);
    }

    if !destination.is_empty() {
        if let Err(reason) = check_destination(destination) {
            violations.push(Violation::InvalidDestination { reason });
        }
    }

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    Ok(ValidatedRule {
        source,
        destination: destination.to_string(),
        match_type,
        redirect_type: draft
            .redirect_type
            .and_then(RedirectType::from_status_code)
            .unwrap_or_default(),
        status: if draft.active {
            RuleStatus::Active
        } else {
            RuleStatus::Inactive
        },
    })
}

/// A rule whose destination leads straight back to its own source.
///
/// Exact sources match normalized paths, so a root-relative destination is
/// normalized before comparing: `/old` to `/old?x=1` still loops.
fn is_self_loop(source: &str, destination: &str, match_type: MatchType) -> bool {
    if source == destination {
        return true;
    }
    match_type == MatchType::Exact
        && is_root_relative(destination)
        && NormalizedPath::new(destination).as_str() == source
}

fn is_root_relative(destination: &str) -> bool {
    destination.starts_with('/') && !destination.starts_with("//")
}

fn check_regex_source(source: &str, budget: &MatchBudget) -> Vec<Violation> {
    let mut violations = Vec::new();

    if let Err(err) = CompiledPattern::compile(source, budget).map(|p| p.is_match("")) {
        violations.push(Violation::InvalidPattern {
            reason: err.to_string(),
        });
    }

    let length = source.chars().count();
    if length > MAX_PATTERN_LENGTH {
        violations.push(Violation::PatternTooLong {
            length,
            max: MAX_PATTERN_LENGTH,
        });
    }

    if pattern::is_dangerous(source) {
        violations.push(Violation::DangerousPattern);
    }

    violations
}

fn check_destination(destination: &str) -> Result<(), String> {
    if is_root_relative(destination) {
        let base = Url::parse("http://localhost").map_err(|e| e.to_string())?;
        return base.join(destination).map(|_| ()).map_err(|e| e.to_string());
    }

    let url = Url::parse(destination).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(()),
        "http" | "https" => Err("missing host".to_string()),
        other => Err(format!("unsupported scheme '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(source: &str, destination: &str, match_type: MatchType) -> RuleDraft {
        RuleDraft {
            source: source.to_string(),
            destination: destination.to_string(),
            match_type: Some(match_type),
            redirect_type: Some(301),
            active: true,
        }
    }

    #[test]
    fn accepts_simple_exact_rule() {
        let rule = validate_rule(&draft("/old", "/new", MatchType::Exact)).unwrap();
        assert_eq!(rule.source(), "/old");
        assert_eq!(rule.destination(), "/new");
        assert_eq!(rule.status(), RuleStatus::Active);
        assert_eq!(rule.redirect_type(), RedirectType::Permanent);
    }

    #[test]
    fn exact_source_is_normalized() {
        let rule = validate_rule(&draft("  /old?utm=1 ", "/new", MatchType::Exact)).unwrap();
        assert_eq!(rule.source(), "/old");
    }

    #[test]
    fn regex_source_is_kept_verbatim() {
        let rule = validate_rule(&draft("^/blog/(.*)$", "/posts/$1", MatchType::Regex)).unwrap();
        assert_eq!(rule.source(), "^/blog/(.*)$");
        assert_eq!(rule.match_type(), MatchType::Regex);
    }

    #[test]
    fn rejects_self_loop() {
        let err = validate_rule(&draft("/same", "/same", MatchType::Exact)).unwrap_err();
        assert_eq!(err.violations, vec![Violation::SelfLoop]);
    }

    #[test]
    fn rejects_self_loop_hidden_behind_query_string() {
        let err = validate_rule(&draft("/old?x=1", "/old", MatchType::Exact)).unwrap_err();
        assert_eq!(err.violations, vec![Violation::SelfLoop]);

        let err = validate_rule(&draft("/old", "/old?utm=1#top", MatchType::Exact)).unwrap_err();
        assert_eq!(err.violations, vec![Violation::SelfLoop]);

        let err =
            validate_rule(&draft("https://example.com/old", "/old", MatchType::Exact)).unwrap_err();
        assert_eq!(err.violations, vec![Violation::SelfLoop]);
    }

    #[test]
    fn absolute_destination_with_same_path_is_not_a_loop() {
        assert!(validate_rule(&draft("/old", "https://other.example/old", MatchType::Exact)).is_ok());
    }

    #[test]
    fn exact_source_must_start_with_slash() {
        let err = validate_rule(&draft("old", "/new", MatchType::Exact)).unwrap_err();
        assert_eq!(err.violations, vec![Violation::SourceNotRootRelative]);

        assert!(validate_rule(&draft("^old", "/new", MatchType::Regex)).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let err = validate_rule(&draft("", "", MatchType::Exact)).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Violation::SourceRequired, Violation::DestinationRequired]
        );
    }

    #[test]
    fn rejects_dangerous_pattern() {
        let err = validate_rule(&draft("(a+)+", "/x", MatchType::Regex)).unwrap_err();
        assert!(err.contains(&Violation::DangerousPattern));
    }

    #[test]
    fn rejects_uncompilable_pattern() {
        let err = validate_rule(&draft("^/(broken", "/x", MatchType::Regex)).unwrap_err();
        assert!(matches!(
            err.violations.as_slice(),
            [Violation::InvalidPattern { .. }]
        ));
    }

    #[test]
    fn rejects_overlong_pattern_alongside_other_problems() {
        let long = format!("^/{}(a+)+", "x".repeat(MAX_PATTERN_LENGTH));
        let err = validate_rule(&draft(&long, "/x", MatchType::Regex)).unwrap_err();
        assert!(err.contains(&Violation::DangerousPattern));
        assert!(err
            .violations
            .iter()
            .any(|v| matches!(v, Violation::PatternTooLong { .. })));
    }

    #[test]
    fn regex_checks_do_not_apply_to_exact_rules() {
        assert!(validate_rule(&draft("/(a+)+", "/x", MatchType::Exact)).is_ok());
    }

    #[test]
    fn unsupported_redirect_type_defaults_to_permanent() {
        let mut d = draft("/a", "/b", MatchType::Exact);
        d.redirect_type = Some(308);
        assert_eq!(
            validate_rule(&d).unwrap().redirect_type(),
            RedirectType::Permanent
        );
        d.redirect_type = Some(307);
        assert_eq!(
            validate_rule(&d).unwrap().redirect_type(),
            RedirectType::Temporary
        );
    }

    #[test]
    fn status_defaults_to_inactive() {
        let d = RuleDraft {
            source: "/a".to_string(),
            destination: "/b".to_string(),
            ..RuleDraft::default()
        };
        let rule = validate_rule(&d).unwrap();
        assert_eq!(rule.status(), RuleStatus::Inactive);
        assert_eq!(rule.match_type(), MatchType::Exact);
    }

    #[test]
    fn destination_must_be_a_url() {
        for bad in ["javascript:alert(1)", "http://", "not a url", "//evil.example/x"] {
            let err = validate_rule(&draft("/a", bad, MatchType::Exact)).unwrap_err();
            assert!(
                err.violations
                    .iter()
                    .any(|v| matches!(v, Violation::InvalidDestination { .. })),
                "{bad} should be rejected"
            );
        }
        assert!(validate_rule(&draft("/a", "https://example.com/b", MatchType::Exact)).is_ok());
    }

    #[test]
    fn error_message_lists_all_violations() {
        let err = validate_rule(&draft("", "", MatchType::Exact)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("source URL is required"));
        assert!(message.contains("destination URL is required"));
    }
}
