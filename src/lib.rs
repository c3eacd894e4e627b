//! Incremental aggregation of semantic models and application profiles.
//!
//! Vocabularies and profiles live in [`semantic_model::EntityStore`]s. The
//! aggregators in [`aggregator`] layer on top of them and keep a live view of
//! the effective value of every entity, recomputed whenever anything it
//! depends on changes.

pub use self::errors::Error;

pub mod aggregator;
pub mod config;
pub mod errors;
pub mod logger;
pub mod notify;
pub mod semantic_model;

/// Application results options list
pub type Result<T, E = Error> = std::result::Result<T, E>;
