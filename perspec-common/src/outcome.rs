//! Result of a best-effort call to an external collaborator.
//!
//! Gateways never raise. They report one of three things: data was found,
//! the call succeeded but had nothing to say, or the call failed (with a
//! kind the orchestrator can turn into a user-facing message).
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    NotFound,
    Network,
    Timeout,
    Upstream,
    Malformed,
    Configuration,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Upstream => "upstream",
            Self::Malformed => "malformed",
            Self::Configuration => "configuration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
}

impl Failure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

/// Found / empty / failed.
///
/// ```
/// use perspec_common::{Failure, FailureKind, Outcome};
///
/// let hits: Outcome<Vec<u8>> = Outcome::from_collection(vec![]);
/// assert!(hits.is_empty());
///
/// let failed: Outcome<String> = Outcome::Failed(Failure::new(FailureKind::RateLimited, "429"));
/// assert_eq!(failed.failure().map(|f| f.kind), Some(FailureKind::RateLimited));
/// assert_eq!(failed.unwrap_or_default(), "");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Found(T),
    Empty,
    Failed(Failure),
}

impl<T> Outcome<T> {
    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failed(Failure::new(kind, detail))
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(f) => Some(f),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Found(v) => Outcome::Found(f(v)),
            Self::Empty => Outcome::Empty,
            Self::Failed(e) => Outcome::Failed(e),
        }
    }

    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.found().unwrap_or_default()
    }
}

impl<T> Outcome<Vec<T>> {
    /// An empty vector is reported as [`Outcome::Empty`].
    pub fn from_collection(items: Vec<T>) -> Self {
        if items.is_empty() {
            Self::Empty
        } else {
            Self::Found(items)
        }
    }
}

impl Outcome<String> {
    /// Whitespace-only text is reported as [`Outcome::Empty`].
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            Self::Empty
        } else {
            Self::Found(text)
        }
    }
}
