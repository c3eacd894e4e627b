//! Crate-wide error type.

use thiserror::Error;

use crate::semantic_model::{EntityId, IriError};

/// Errors surfaced by stores, aggregators and configuration loading.
#[derive(Debug, Error)]
pub enum Error {
    /// The aggregator was configured without the capability required by the operation.
    #[error("`{operation}` is not permitted on model `{model}`")]
    PermissionDenied { operation: String, model: String },

    /// A referenced entity could not be found locally nor upstream.
    #[error("entity `{id}` cannot be resolved")]
    UnresolvedReference { id: EntityId },

    /// An operation targeted an entity that does not exist.
    #[error("entity `{id}` not found")]
    NotFound { id: EntityId },

    /// An operation expected a different kind of entity.
    #[error("entity `{id}` is not a {expected}")]
    UnexpectedEntityKind { id: EntityId, expected: &'static str },

    /// A profiling chain loops back to its origin.
    #[error("profiling cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<EntityId> },

    /// No generalization path connects the two classes.
    #[error("no generalization path from `{from}` to `{to}`")]
    MalformedGeneralizationChain { from: EntityId, to: EntityId },

    /// The bridging request carried no action for this aggregator.
    #[error("candidate `{id}` carries no originating action")]
    MissingOriginatingAction { id: EntityId },

    #[error(transparent)]
    InvalidIri(#[from] IriError),

    /// An external semantic model source failed.
    #[error("external source error: {0}")]
    Source(String),

    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn permission_denied(operation: &str, model: &str) -> Self {
        Self::PermissionDenied {
            operation: operation.to_string(),
            model: model.to_string(),
        }
    }

    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    pub(crate) fn unresolved(id: &str) -> Self {
        Self::UnresolvedReference { id: id.to_string() }
    }

    pub(crate) fn unexpected_kind(id: &str, expected: &'static str) -> Self {
        Self::UnexpectedEntityKind {
            id: id.to_string(),
            expected,
        }
    }
}
