//! Operations accepted by an editable [`EntityStore`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Error;

use super::entities::{
    SemanticModelClass, SemanticModelClassProfile, SemanticModelEntity,
    SemanticModelGeneralization, SemanticModelRelationship, SemanticModelRelationshipProfile,
};
use super::store::EntityStore;
use super::value_objects::EntityId;

/// Mutation request executed against a profile or vocabulary store.
///
/// Create operations ignore the identifier of the supplied entity when it is
/// empty and allocate a fresh one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum Operation {
    CreateClass {
        class: SemanticModelClass,
    },
    CreateRelationship {
        relationship: SemanticModelRelationship,
    },
    CreateClassProfile {
        profile: SemanticModelClassProfile,
    },
    ModifyClassProfile {
        profile: SemanticModelClassProfile,
    },
    CreateRelationshipProfile {
        profile: SemanticModelRelationshipProfile,
    },
    ModifyRelationshipProfile {
        profile: SemanticModelRelationshipProfile,
    },
    CreateGeneralization {
        generalization: SemanticModelGeneralization,
    },
    DeleteEntity {
        id: EntityId,
    },
}

impl Operation {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateClass { .. } => "create-class",
            Self::CreateRelationship { .. } => "create-relationship",
            Self::CreateClassProfile { .. } => "create-class-profile",
            Self::ModifyClassProfile { .. } => "modify-class-profile",
            Self::CreateRelationshipProfile { .. } => "create-relationship-profile",
            Self::ModifyRelationshipProfile { .. } => "modify-relationship-profile",
            Self::CreateGeneralization { .. } => "create-generalization",
            Self::DeleteEntity { .. } => "delete-entity",
        }
    }
}

/// Outcome of [`EntityStore::execute`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Identifiers of entities created by the operation.
    pub created: Vec<EntityId>,
}

impl OperationResult {
    /// Identifier of the first created entity.
    #[must_use]
    pub fn created_id(&self) -> Option<&str> {
        self.created.first().map(String::as_str)
    }
}

fn assign_id(id: &mut EntityId) -> EntityId {
    if id.is_empty() {
        *id = Uuid::new_v4().to_string();
    }
    id.clone()
}

impl EntityStore {
    /// Applies an [`Operation`], publishing the resulting delta.
    pub fn execute(&self, operation: Operation) -> crate::Result<OperationResult> {
        let mut created = Vec::new();
        let (entity, removed): (Option<SemanticModelEntity>, Option<EntityId>) = match operation {
            Operation::CreateClass { mut class } => {
                created.push(assign_id(&mut class.id));
                (Some(class.into()), None)
            }
            Operation::CreateRelationship { mut relationship } => {
                created.push(assign_id(&mut relationship.id));
                (Some(relationship.into()), None)
            }
            Operation::CreateClassProfile { mut profile } => {
                created.push(assign_id(&mut profile.id));
                (Some(profile.into()), None)
            }
            Operation::CreateRelationshipProfile { mut profile } => {
                created.push(assign_id(&mut profile.id));
                (Some(profile.into()), None)
            }
            Operation::CreateGeneralization { mut generalization } => {
                created.push(assign_id(&mut generalization.id));
                (Some(generalization.into()), None)
            }
            Operation::ModifyClassProfile { profile } => match self.get(&profile.id) {
                Some(SemanticModelEntity::ClassProfile(_)) => (Some(profile.into()), None),
                Some(_) => return Err(Error::unexpected_kind(&profile.id, "class profile")),
                None => return Err(Error::not_found(&profile.id)),
            },
            Operation::ModifyRelationshipProfile { profile } => match self.get(&profile.id) {
                Some(SemanticModelEntity::RelationshipProfile(_)) => (Some(profile.into()), None),
                Some(_) => {
                    return Err(Error::unexpected_kind(&profile.id, "relationship profile"))
                }
                None => return Err(Error::not_found(&profile.id)),
            },
            Operation::DeleteEntity { id } => {
                if !self.contains(&id) {
                    return Err(Error::not_found(&id));
                }
                (None, Some(id))
            }
        };

        self.change(entity.into_iter().collect(), removed.into_iter().collect());
        Ok(OperationResult { created })
    }
}
