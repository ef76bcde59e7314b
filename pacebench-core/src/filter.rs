//! Test name filtering

use regex::{Regex, RegexBuilder};

/// Case-insensitive name patterns.
///
/// An empty filter enables everything. Otherwise a test is enabled when any
/// pattern matches its own name or the name of any enclosing describe.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    patterns: Vec<Regex>,
}

impl NameFilter {
    /// Filter that enables every test
    pub fn all() -> Self {
        Self::default()
    }

    /// Compile patterns (case-insensitive)
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p.as_ref()).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// `true` when no pattern is configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// `true` when any pattern matches `name`
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    /// Decide whether a test is enabled given its own name and its
    /// ancestors' names
    pub fn enables<'a, I>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.is_empty() || names.into_iter().any(|name| self.matches(name))
    }
}
