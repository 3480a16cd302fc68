//! Allow-list and ignore-list matching.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single allow-list or ignore-list entry.
#[derive(Clone)]
pub enum Matcher {
    /// Exact string match.
    Literal(String),
    /// Regular expression match.
    Pattern(Regex),
    /// Matches an absent value, e.g. a part without a content type.
    Missing,
}

impl Matcher {
    /// Exact string matcher.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Compile a pattern matcher.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    /// Check a value against this entry.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Literal(expected), Some(v)) => expected == v,
            (Self::Pattern(re), Some(v)) => re.is_match(v),
            (Self::Missing, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Missing => f.write_str("Missing"),
        }
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Self::literal(value)
    }
}

impl From<Regex> for Matcher {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

/// Serialized form of a [`Matcher`].
///
/// A plain string is a literal; `{ pattern = "..." }` is a regex;
/// `{ missing = true }` matches an absent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatcherSpec {
    /// Literal string.
    Literal(String),
    /// Regular expression.
    Pattern {
        /// Regex source.
        pattern: String,
    },
    /// Absent value.
    Missing {
        /// Must be `true`.
        missing: bool,
    },
}

impl MatcherSpec {
    /// Compile into a matcher. `{ missing = false }` yields nothing.
    pub fn compile(&self) -> Result<Option<Matcher>, regex::Error> {
        match self {
            Self::Literal(v) => Ok(Some(Matcher::literal(v.clone()))),
            Self::Pattern { pattern } => Matcher::pattern(pattern).map(Some),
            Self::Missing { missing } => Ok(missing.then_some(Matcher::Missing)),
        }
    }
}

/// A set of matchers, used identically for allow-lists and ignore-lists.
#[derive(Debug, Clone, Default)]
pub struct MatcherSet {
    entries: Vec<Matcher>,
}

impl MatcherSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn with(mut self, matcher: impl Into<Matcher>) -> Self {
        self.entries.push(matcher.into());
        self
    }

    /// Whether any entry matches the value.
    pub fn matches(&self, value: Option<&str>) -> bool {
        self.entries.iter().any(|m| m.matches(value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compile serialized entries.
    pub fn compile(specs: &[MatcherSpec]) -> Result<Self, regex::Error> {
        let mut set = Self::new();
        for spec in specs {
            if let Some(matcher) = spec.compile()? {
                set.entries.push(matcher);
            }
        }
        Ok(set)
    }
}

impl<M: Into<Matcher>> FromIterator<M> for MatcherSet {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_pattern() {
        let set = MatcherSet::new()
            .with("application/pdf")
            .with(Matcher::pattern("^image/").unwrap());

        assert!(set.matches(Some("application/pdf")));
        assert!(set.matches(Some("image/png")));
        assert!(!set.matches(Some("application/pdfx")));
        assert!(!set.matches(Some("text/plain")));
        assert!(!set.matches(None));
    }

    #[test]
    fn test_missing_entry() {
        let set: MatcherSet = [Matcher::Missing].into_iter().collect();
        assert!(set.matches(None));
        assert!(!set.matches(Some("text/plain")));
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        assert!(!MatcherSet::new().matches(Some("anything")));
    }

    #[test]
    fn test_compile_specs() {
        let specs: Vec<MatcherSpec> = serde_json::from_str(
            r#"["text/csv", {"pattern": "^video/"}, {"missing": true}, {"missing": false}]"#,
        )
        .unwrap();
        let set = MatcherSet::compile(&specs).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.matches(Some("video/mp4")));
        assert!(set.matches(None));
    }

    #[test]
    fn test_invalid_pattern() {
        let specs = vec![MatcherSpec::Pattern {
            pattern: "(".into(),
        }];
        assert!(MatcherSet::compile(&specs).is_err());
    }
}
