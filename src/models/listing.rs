use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of job boards a crawl can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Indeed,
    LinkedIn,
    BuiltIn,
    Google,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Indeed,
        Source::LinkedIn,
        Source::BuiltIn,
        Source::Google,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Source::Indeed => "Indeed",
            Source::LinkedIn => "LinkedIn",
            Source::BuiltIn => "BuiltIn",
            Source::Google => "Google",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Source::ALL
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown job source '{wanted}'"))
    }
}

/// A single posting as found on one source.
///
/// `description` starts as whatever the search page showed (often a snippet)
/// and is replaced at most once by the collector's description fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub title: String,
    pub company: String,
    pub description: String,
    pub url: String,
    pub source: Source,
}

/// Closing marker of the title of listings that stand in for a failed
/// search, as in "(Indeed unavailable)".
const UNAVAILABLE_SUFFIX: &str = " unavailable)";

impl JobListing {
    /// Build the stand-in listing returned when a source cannot be searched.
    pub fn unavailable(source: Source, url: &str, error: impl fmt::Display, hint: &str) -> Self {
        let mut description = format!("Error: {error}.");
        if !hint.is_empty() {
            description.push(' ');
            description.push_str(hint);
        }
        JobListing {
            title: format!("({source} unavailable)"),
            company: String::new(),
            description,
            url: url.to_string(),
            source,
        }
    }

    /// True for stand-in listings and listings without a usable title.
    pub fn is_unavailable(&self) -> bool {
        let title = self.title.trim().to_lowercase();
        title.is_empty()
            || title.contains("(unavailable)")
            || (title.starts_with('(') && title.ends_with(UNAVAILABLE_SUFFIX))
    }

    pub fn dedupe_key(&self) -> DedupeKey {
        DedupeKey {
            title: normalize_key_part(&self.title),
            company: normalize_key_part(&self.company),
            source: self.source,
        }
    }
}

/// Identity of a listing within one crawl run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    title: String,
    company: String,
    source: Source,
}

fn normalize_key_part(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
