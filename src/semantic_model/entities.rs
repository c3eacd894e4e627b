use serde::{Deserialize, Serialize};

use super::value_objects::{language_string, Cardinality, EntityId, LanguageString};

/// Vocabulary class owned by a semantic model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticModelClass {
    pub id: EntityId,
    pub iri: Option<String>,
    pub name: LanguageString,
    pub description: LanguageString,
}

impl SemanticModelClass {
    /// Creates a new class with the supplied identifier.
    #[must_use]
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_iri(mut self, iri: impl Into<String>) -> Self {
        self.iri = Some(iri.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, language: &str, value: &str) -> Self {
        self.name.insert(language.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_description(mut self, language: &str, value: &str) -> Self {
        self.description = language_string(language, value);
        self
    }
}

/// One end of a [`SemanticModelRelationship`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticModelRelationshipEnd {
    pub iri: Option<String>,
    pub name: LanguageString,
    pub description: LanguageString,
    pub cardinality: Option<Cardinality>,
    /// Identifier of the class at this end.
    pub concept: Option<EntityId>,
}

impl SemanticModelRelationshipEnd {
    #[must_use]
    pub fn new(concept: impl Into<EntityId>) -> Self {
        Self {
            concept: Some(concept.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_iri(mut self, iri: impl Into<String>) -> Self {
        self.iri = Some(iri.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, language: &str, value: &str) -> Self {
        self.name = language_string(language, value);
        self
    }

    #[must_use]
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }
}

/// Vocabulary relationship with a domain end (index 0) and a range end (index 1).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticModelRelationship {
    pub id: EntityId,
    pub iri: Option<String>,
    pub name: LanguageString,
    pub description: LanguageString,
    pub ends: Vec<SemanticModelRelationshipEnd>,
}

impl SemanticModelRelationship {
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        domain: SemanticModelRelationshipEnd,
        range: SemanticModelRelationshipEnd,
    ) -> Self {
        Self {
            id: id.into(),
            ends: vec![domain, range],
            ..Self::default()
        }
    }
}

/// Declares that `child` specializes `parent`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticModelGeneralization {
    pub id: EntityId,
    pub iri: Option<String>,
    pub child: EntityId,
    pub parent: EntityId,
}

impl SemanticModelGeneralization {
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        child: impl Into<EntityId>,
        parent: impl Into<EntityId>,
    ) -> Self {
        Self {
            id: id.into(),
            iri: None,
            child: child.into(),
            parent: parent.into(),
        }
    }
}

/// Profile of one or more classes or class profiles.
///
/// Each `*_from_profiled` pointer, when set, names the profiled entity the
/// corresponding value is inherited from; the local literal is then ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticModelClassProfile {
    pub id: EntityId,
    pub iri: Option<String>,
    pub profiling: Vec<EntityId>,
    pub name: LanguageString,
    pub name_from_profiled: Option<EntityId>,
    pub description: LanguageString,
    pub description_from_profiled: Option<EntityId>,
    pub usage_note: LanguageString,
    pub usage_note_from_profiled: Option<EntityId>,
    pub tags: Vec<EntityId>,
}

impl SemanticModelClassProfile {
    #[must_use]
    pub fn new<I, S>(id: impl Into<EntityId>, profiling: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        Self {
            id: id.into(),
            profiling: profiling.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, language: &str, value: &str) -> Self {
        self.name = language_string(language, value);
        self
    }

    #[must_use]
    pub fn with_name_from_profiled(mut self, source: impl Into<EntityId>) -> Self {
        self.name_from_profiled = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_description_from_profiled(mut self, source: impl Into<EntityId>) -> Self {
        self.description_from_profiled = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_usage_note(mut self, language: &str, value: &str) -> Self {
        self.usage_note = language_string(language, value);
        self
    }

    #[must_use]
    pub fn with_usage_note_from_profiled(mut self, source: impl Into<EntityId>) -> Self {
        self.usage_note_from_profiled = Some(source.into());
        self
    }
}

/// Profile of the matching end of every profiled relationship.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticModelRelationshipEndProfile {
    pub iri: Option<String>,
    pub profiling: Vec<EntityId>,
    pub name: LanguageString,
    pub name_from_profiled: Option<EntityId>,
    pub description: LanguageString,
    pub description_from_profiled: Option<EntityId>,
    pub usage_note: LanguageString,
    pub usage_note_from_profiled: Option<EntityId>,
    /// `None` leaves the cardinality to the profiled ends.
    pub cardinality: Option<Cardinality>,
    pub concept: Option<EntityId>,
    pub tags: Vec<EntityId>,
}

impl SemanticModelRelationshipEndProfile {
    #[must_use]
    pub fn new<I, S>(profiling: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        Self {
            profiling: profiling.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_concept(mut self, concept: impl Into<EntityId>) -> Self {
        self.concept = Some(concept.into());
        self
    }

    #[must_use]
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    #[must_use]
    pub fn with_name_from_profiled(mut self, source: impl Into<EntityId>) -> Self {
        self.name_from_profiled = Some(source.into());
        self
    }
}

/// Profile of relationships, with independently profiled domain and range ends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemanticModelRelationshipProfile {
    pub id: EntityId,
    pub ends: Vec<SemanticModelRelationshipEndProfile>,
}

impl SemanticModelRelationshipProfile {
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        domain: SemanticModelRelationshipEndProfile,
        range: SemanticModelRelationshipEndProfile,
    ) -> Self {
        Self {
            id: id.into(),
            ends: vec![domain, range],
        }
    }

    /// Union of every end's profiling list, in first-seen order.
    #[must_use]
    pub fn profiling(&self) -> Vec<EntityId> {
        let mut result: Vec<EntityId> = Vec::new();
        for id in self.ends.iter().flat_map(|end| end.profiling.iter()) {
            if !result.contains(id) {
                result.push(id.clone());
            }
        }
        result
    }
}

/// Entity held by an entity store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SemanticModelEntity {
    Class(SemanticModelClass),
    Relationship(SemanticModelRelationship),
    Generalization(SemanticModelGeneralization),
    ClassProfile(SemanticModelClassProfile),
    RelationshipProfile(SemanticModelRelationshipProfile),
}

impl SemanticModelEntity {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Class(entity) => &entity.id,
            Self::Relationship(entity) => &entity.id,
            Self::Generalization(entity) => &entity.id,
            Self::ClassProfile(entity) => &entity.id,
            Self::RelationshipProfile(entity) => &entity.id,
        }
    }

    /// Returns the type marker used when serializing the entity.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Class(_) => "class",
            Self::Relationship(_) => "relationship",
            Self::Generalization(_) => "generalization",
            Self::ClassProfile(_) => "class-profile",
            Self::RelationshipProfile(_) => "relationship-profile",
        }
    }

    /// Returns the IRI of vocabulary entities.
    #[must_use]
    pub fn iri(&self) -> Option<&str> {
        match self {
            Self::Class(entity) => entity.iri.as_deref(),
            Self::Relationship(entity) => entity
                .iri
                .as_deref()
                .or_else(|| entity.ends.get(1).and_then(|end| end.iri.as_deref())),
            Self::Generalization(entity) => entity.iri.as_deref(),
            Self::ClassProfile(entity) => entity.iri.as_deref(),
            Self::RelationshipProfile(entity) => {
                entity.ends.get(1).and_then(|end| end.iri.as_deref())
            }
        }
    }

    #[must_use]
    pub fn is_profile(&self) -> bool {
        matches!(self, Self::ClassProfile(_) | Self::RelationshipProfile(_))
    }
}

impl From<SemanticModelClass> for SemanticModelEntity {
    fn from(value: SemanticModelClass) -> Self {
        Self::Class(value)
    }
}

impl From<SemanticModelRelationship> for SemanticModelEntity {
    fn from(value: SemanticModelRelationship) -> Self {
        Self::Relationship(value)
    }
}

impl From<SemanticModelGeneralization> for SemanticModelEntity {
    fn from(value: SemanticModelGeneralization) -> Self {
        Self::Generalization(value)
    }
}

impl From<SemanticModelClassProfile> for SemanticModelEntity {
    fn from(value: SemanticModelClassProfile) -> Self {
        Self::ClassProfile(value)
    }
}

impl From<SemanticModelRelationshipProfile> for SemanticModelEntity {
    fn from(value: SemanticModelRelationshipProfile) -> Self {
        Self::RelationshipProfile(value)
    }
}
