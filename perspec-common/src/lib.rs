//! Common types and utilities shared across Perspec crates.
//!
//! This crate defines the request-scoped domain model, the fail-soft
//! [`Outcome`] type returned by every gateway, and the observability
//! bootstrap. It stays dependency-light so every crate in the
//! workspace can depend on it.
//!
//! # Overview
//!
//! - [`Tweet`], [`UserIdentity`], [`Perspective`]: the data model
//! - [`Outcome`] and [`Failure`]: found / empty / failed results
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use perspec_common::{Perspective, Tweet};
//!
//! let tweets = vec![Tweet::new("20", "newer"), Tweet::new("3", "older")];
//! assert_eq!(perspec_common::oldest_id(&tweets), Some("3"));
//! assert_eq!(Perspective::parse_label("Third person."), Perspective::Third);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;
pub mod outcome;

pub use outcome::{Failure, FailureKind, Outcome};

/// A single tweet as consumed by the pipeline.
///
/// Two tweets with the same `id` are the same tweet, whatever their text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
}

impl Tweet {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Tweet ids are decimal snowflakes; `None` for anything else.
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.parse().ok()
    }
}

/// Id of the oldest tweet (smallest snowflake) in the slice.
///
/// Tweets whose id is not numeric are ignored.
pub fn oldest_id(tweets: &[Tweet]) -> Option<&str> {
    tweets
        .iter()
        .filter_map(|t| t.numeric_id().map(|n| (n, t.id.as_str())))
        .min_by_key(|(n, _)| *n)
        .map(|(_, id)| id)
}

/// Identity of a Twitter account resolved from a handle.
///
/// Every field is `None` when resolution failed; "not found" and "upstream
/// error" are not told apart at this level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl UserIdentity {
    /// The all-`None` identity.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Both the id and the display name are known.
    pub fn is_resolved(&self) -> bool {
        matches!((&self.id, &self.display_name), (Some(id), Some(name)) if !id.is_empty() && !name.is_empty())
    }
}

/// Grammatical person of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    First,
    Second,
    Third,
    Unknown,
}

impl Perspective {
    /// Interpret a free-form classifier answer such as `"Second person."`.
    ///
    /// The first of `first` / `second` / `third` found in the text wins.
    pub fn parse_label(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        [
            ("first", Self::First),
            ("second", Self::Second),
            ("third", Self::Third),
        ]
        .into_iter()
        .filter_map(|(word, p)| lower.find(word).map(|pos| (pos, p)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, p)| p)
        .unwrap_or(Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_id_uses_numeric_order() {
        let tweets = vec![
            Tweet::new("1000", "a"),
            Tweet::new("999", "b"),
            Tweet::new("not-a-number", "c"),
        ];
        assert_eq!(oldest_id(&tweets), Some("999"));
        assert_eq!(oldest_id(&[]), None);
    }

    #[test]
    fn perspective_label_parsing() {
        assert_eq!(Perspective::parse_label(" First"), Perspective::First);
        assert_eq!(Perspective::parse_label("second person"), Perspective::Second);
        assert_eq!(Perspective::parse_label("THIRD"), Perspective::Third);
        assert_eq!(Perspective::parse_label("I cannot tell"), Perspective::Unknown);
        assert_eq!(
            Perspective::parse_label("third, not first"),
            Perspective::Third
        );
    }

    #[test]
    fn identity_resolution() {
        assert!(!UserIdentity::unresolved().is_resolved());
        let id = UserIdentity {
            id: Some("12".into()),
            display_name: Some("Jack".into()),
            ..Default::default()
        };
        assert!(id.is_resolved());

        let json = serde_json::to_value(UserIdentity::unresolved()).unwrap();
        assert!(json["id"].is_null());
        assert!(json["displayName"].is_null());
    }
}
