//! Regex rule patterns: compilation under an explicit budget and static
//! rejection of backtracking-prone shapes.
//!
//! Patterns are compiled with the `regex` crate, which matches in time linear
//! in the subject. The remaining attack surface is the size of the compiled
//! program and of the lazy DFA cache, so both are capped per compile by a
//! [`MatchBudget`] instead of any process-wide setting.

use crate::error::PatternError;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Maximum accepted length of a regex rule source, in characters.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Resource limits applied when a rule pattern is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchBudget {
    /// Upper bound on the compiled program, in bytes.
    pub program_size: usize,
    /// Upper bound on the lazy DFA cache used while matching, in bytes.
    pub lazy_dfa_size: usize,
    /// Maximum nesting depth of groups and repetitions.
    pub nest_limit: u32,
}

impl Default for MatchBudget {
    fn default() -> Self {
        Self {
            program_size: 256 * 1024,
            lazy_dfa_size: 512 * 1024,
            nest_limit: 32,
        }
    }
}

/// A rule pattern compiled under a [`MatchBudget`].
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
}

impl CompiledPattern {
    pub fn compile(pattern: &str, budget: &MatchBudget) -> Result<Self, PatternError> {
        let regex = RegexBuilder::new(pattern)
            .size_limit(budget.program_size)
            .dfa_size_limit(budget.lazy_dfa_size)
            .nest_limit(budget.nest_limit)
            .build()?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, subject: &str) -> bool {
        self.regex.is_match(subject)
    }

    /// Replaces every match in `subject` with `template`, leaving the
    /// unmatched parts of `subject` in place. Returns `None` when the pattern
    /// does not match at all.
    ///
    /// Group references may be written `$1`, `\1` or `${1}`; a named group
    /// is `${name}`. A digit after a short reference is literal, so `$1abc`
    /// is group 1 followed by `abc`. Any other `$` is a literal dollar.
    pub fn substitute(&self, subject: &str, template: &str) -> Option<String> {
        if !self.regex.is_match(subject) {
            return None;
        }
        let replacement = replacement_template(template);
        Some(
            self.regex
                .replace_all(subject, replacement.as_str())
                .into_owned(),
        )
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Rewrites a rule destination into `regex` replacement syntax.
fn replacement_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' | '\\' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut group = String::with_capacity(2);
                while group.len() < 2 {
                    match chars.next_if(char::is_ascii_digit) {
                        Some(digit) => group.push(digit),
                        None => break,
                    }
                }
                out.push_str("${");
                out.push_str(&group);
                out.push('}');
            }
            '$' if chars.peek() == Some(&'{') => {
                out.push('$');
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '}' {
                        break;
                    }
                }
            }
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }
    out
}

static DANGEROUS_SHAPES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        // a quantifier immediately re-quantified: `a++`, `.*+`
        Regex::new(r"[+*]\+").expect("static pattern"),
        // lazy quantifier followed by another quantifier: `a+?*`
        Regex::new(r"[+*]\?[+*]").expect("static pattern"),
        // quantified group whose body is itself quantified: `(a+)+`, `(x*y)*`
        Regex::new(r"\([^)]*[+*][^)]*\)[+*]").expect("static pattern"),
    ]
});

/// Reports whether `pattern` contains a known catastrophic-backtracking shape.
///
/// This is a textual heuristic. It rejects some harmless patterns (an escaped
/// `\++` trips the first shape) and misses others (alternation-based blowups
/// such as `(a|a)*`).
pub fn is_dangerous(pattern: &str) -> bool {
    DANGEROUS_SHAPES.iter().any(|shape| shape.is_match(pattern))
}
