//! Domain filter
//!
//! Decides whether a DNS name is in scope for this webhook. A filter is built
//! once at startup in one of two modes and never changes afterwards:
//!
//! - **Names**: include/exclude lists of domains, matched on label boundaries
//! - **Regex**: an include pattern and an optional exclude pattern
//!
//! The filter is also what the webhook hands back to external-dns during
//! negotiation, so it serialises to the protocol's JSON shape.

use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Immutable in-scope predicate for DNS names
#[derive(Debug, Clone)]
pub enum DomainFilter {
    /// Literal include/exclude lists
    Names {
        /// Normalised include entries; empty means "everything"
        include: Vec<String>,
        /// Normalised exclude entries
        exclude: Vec<String>,
    },
    /// Regular-expression include/exclude pair
    Regex {
        /// Names must match this pattern
        include: Regex,
        /// Names matching this pattern are rejected
        exclude: Option<Regex>,
    },
}

impl DomainFilter {
    /// A filter that accepts every name
    pub fn match_all() -> Self {
        Self::Names {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Build a literal filter from include and exclude lists
    ///
    /// Entries are trimmed, lowercased and stripped of a trailing dot; empty
    /// entries are dropped.
    pub fn with_exclusions<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self::Names {
            include: prepare_entries(include),
            exclude: prepare_entries(exclude),
        }
    }

    /// Build a regex filter
    ///
    /// An empty `exclude` pattern excludes nothing. Fails if either pattern
    /// does not compile.
    pub fn regex(include: &str, exclude: &str) -> Result<Self> {
        let include = compile(include)?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(compile(exclude)?)
        };
        Ok(Self::Regex { include, exclude })
    }

    /// True when the filter restricts anything at all
    pub fn is_configured(&self) -> bool {
        match self {
            Self::Names { include, exclude } => !include.is_empty() || !exclude.is_empty(),
            Self::Regex { .. } => true,
        }
    }

    /// Whether `name` is in scope
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Names { include, exclude } => {
                let name = normalize(name);
                (include.is_empty() || matches_any(include, &name)) && !matches_any(exclude, &name)
            }
            Self::Regex { include, exclude } => {
                let name = normalize(name);
                include.is_match(&name) && !exclude.as_ref().is_some_and(|re| re.is_match(&name))
            }
        }
    }
}

impl Default for DomainFilter {
    fn default() -> Self {
        Self::match_all()
    }
}

impl Serialize for DomainFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Self::Names { include, exclude } => {
                if !include.is_empty() {
                    map.serialize_entry("include", include)?;
                }
                if !exclude.is_empty() {
                    map.serialize_entry("exclude", exclude)?;
                }
            }
            Self::Regex { include, exclude } => {
                map.serialize_entry("regexInclude", include.as_str())?;
                if let Some(exclude) = exclude {
                    map.serialize_entry("regexExclude", exclude.as_str())?;
                }
            }
        }
        map.end()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::filter(format!("invalid pattern '{}': {}", pattern, e)))
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

fn prepare_entries<I>(entries: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| normalize(entry.as_ref()))
        .filter(|entry| !entry.is_empty())
        .collect()
}

// `name` equals an entry or sits below it on a label boundary. An entry with a
// leading dot only matches strict descendants.
fn matches_any(entries: &[String], name: &str) -> bool {
    entries.iter().any(|entry| {
        if entry.starts_with('.') {
            name.ends_with(entry.as_str())
        } else {
            name == entry
                || name
                    .strip_suffix(entry.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        }
    })
}
