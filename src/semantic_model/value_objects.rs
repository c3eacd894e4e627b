use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use oxrdf::NamedNode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of an entity, unique within its owning store.
pub type EntityId = String;

/// Text keyed by language tag, e.g. `{"en": "Dataset"}`.
pub type LanguageString = BTreeMap<String, String>;

/// Builds a [`LanguageString`] holding a single value.
#[must_use]
pub fn language_string(language: &str, value: &str) -> LanguageString {
    BTreeMap::from([(language.to_string(), value.to_string())])
}

/// Absolute IRI, checked with `oxrdf` on construction.
///
/// External sources are keyed by IRI, so invalid identifiers are rejected
/// before any request leaves the aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri(String);

impl Iri {
    pub fn new(value: impl Into<String>) -> Result<Self, IriError> {
        let value = value.into();
        match NamedNode::new(value.as_str()) {
            Ok(_) => Ok(Self(value)),
            Err(err) => Err(IriError::Invalid {
                reason: err.to_string(),
                value,
            }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IriError {
    #[error("`{value}` is not an absolute IRI: {reason}")]
    Invalid { value: String, reason: String },
}

/// Cardinality range `[min, max]`, where a missing `max` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cardinality {
    pub min: u64,
    pub max: Option<u64>,
}

impl Cardinality {
    #[must_use]
    pub const fn new(min: u64, max: Option<u64>) -> Self {
        Self { min, max }
    }

    /// Narrows a set of cardinalities to their intersection.
    ///
    /// The lower bound is the largest minimum, the upper bound the smallest
    /// finite maximum. The result stays unbounded only when every input is
    /// unbounded. Returns `None` for an empty input, meaning "unconstrained".
    #[must_use]
    pub fn intersect_all<I>(cardinalities: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        cardinalities.into_iter().reduce(|left, right| Self {
            min: left.min.max(right.min),
            max: match (left.max, right.max) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) | (None, Some(a)) => Some(a),
                (None, None) => None,
            },
        })
    }
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{max}]", self.min),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}
