//! Semantic model primitives: vocabulary entities, profiles and the stores holding them.
//!
//! Entities are plain records; every mutation replaces the stored value and
//! is announced to store listeners as an [`EntityChange`].

pub mod entities;
pub mod generalization;
pub mod operations;
pub mod store;
pub mod value_objects;

pub use entities::{
    SemanticModelClass, SemanticModelClassProfile, SemanticModelEntity,
    SemanticModelGeneralization, SemanticModelRelationship, SemanticModelRelationshipEnd,
    SemanticModelRelationshipEndProfile, SemanticModelRelationshipProfile,
};
pub use generalization::{copy_inheritance, find_generalization_path};
pub use operations::{Operation, OperationResult};
pub use store::{EntityChange, EntityStore};
pub use value_objects::{language_string, Cardinality, EntityId, Iri, IriError, LanguageString};
