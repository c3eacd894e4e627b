//! Computes the effective value of a profile from its direct contributors.
//!
//! Contributors are passed in already aggregated, so inheritance across long
//! profiling chains resolves one layer at a time.

use serde::{Deserialize, Serialize};

use super::AggregatedEntity;
use crate::semantic_model::{
    Cardinality, EntityId, LanguageString, SemanticModelClassProfile,
    SemanticModelRelationshipEnd, SemanticModelRelationshipEndProfile,
    SemanticModelRelationshipProfile,
};

/// Class profile with inherited values resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregatedClassProfile {
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
    /// IRIs of the vocabulary classes ultimately profiled.
    pub concept_iris: Vec<String>,
}

impl AggregatedClassProfile {
    /// Takes the profile's own values, leaving every inherited value unresolved.
    #[must_use]
    pub fn unresolved(profile: SemanticModelClassProfile) -> Self {
        Self {
            id: profile.id,
            iri: profile.iri,
            profiling: profile.profiling,
            name: profile.name,
            name_from_profiled: profile.name_from_profiled,
            description: profile.description,
            description_from_profiled: profile.description_from_profiled,
            usage_note: profile.usage_note,
            usage_note_from_profiled: profile.usage_note_from_profiled,
            tags: profile.tags,
            concept_iris: Vec::new(),
        }
    }
}

/// Relationship end profile with inherited values resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregatedRelationshipEndProfile {
    pub iri: Option<String>,
    pub profiling: Vec<EntityId>,
    pub name: LanguageString,
    pub name_from_profiled: Option<EntityId>,
    pub description: LanguageString,
    pub description_from_profiled: Option<EntityId>,
    pub usage_note: LanguageString,
    pub usage_note_from_profiled: Option<EntityId>,
    pub cardinality: Option<Cardinality>,
    pub concept: Option<EntityId>,
    pub tags: Vec<EntityId>,
    pub concept_iris: Vec<String>,
}

impl AggregatedRelationshipEndProfile {
    #[must_use]
    pub fn unresolved(end: SemanticModelRelationshipEndProfile) -> Self {
        Self {
            iri: end.iri,
            profiling: end.profiling,
            name: end.name,
            name_from_profiled: end.name_from_profiled,
            description: end.description,
            description_from_profiled: end.description_from_profiled,
            usage_note: end.usage_note,
            usage_note_from_profiled: end.usage_note_from_profiled,
            cardinality: end.cardinality,
            concept: end.concept,
            tags: end.tags,
            concept_iris: Vec::new(),
        }
    }
}

/// Relationship profile with inherited values resolved per end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregatedRelationshipProfile {
    pub id: EntityId,
    pub ends: Vec<AggregatedRelationshipEndProfile>,
}

impl AggregatedRelationshipProfile {
    #[must_use]
    pub fn unresolved(profile: SemanticModelRelationshipProfile) -> Self {
        Self {
            id: profile.id,
            ends: profile
                .ends
                .into_iter()
                .map(AggregatedRelationshipEndProfile::unresolved)
                .collect(),
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Name,
    Description,
    UsageNote,
}

/// Relationship end as seen through one contributor.
enum EndSource<'a> {
    Vocabulary(&'a SemanticModelRelationshipEnd),
    Profile(&'a AggregatedRelationshipEndProfile),
}

impl EndSource<'_> {
    fn value(&self, field: Field) -> Option<&LanguageString> {
        match (self, field) {
            (Self::Vocabulary(end), Field::Name) => Some(&end.name),
            (Self::Vocabulary(end), Field::Description) => Some(&end.description),
            (Self::Vocabulary(_), Field::UsageNote) => None,
            (Self::Profile(end), Field::Name) => Some(&end.name),
            (Self::Profile(end), Field::Description) => Some(&end.description),
            (Self::Profile(end), Field::UsageNote) => Some(&end.usage_note),
        }
    }

    fn cardinality(&self) -> Option<Cardinality> {
        match self {
            Self::Vocabulary(end) => end.cardinality,
            Self::Profile(end) => end.cardinality,
        }
    }

    fn concept(&self) -> Option<&EntityId> {
        match self {
            Self::Vocabulary(end) => end.concept.as_ref(),
            Self::Profile(end) => end.concept.as_ref(),
        }
    }

    fn concept_iris(&self) -> Vec<String> {
        match self {
            Self::Vocabulary(end) => end.iri.iter().cloned().collect(),
            Self::Profile(end) => end.concept_iris.clone(),
        }
    }
}

fn class_value(entity: &AggregatedEntity, field: Field) -> Option<&LanguageString> {
    match (entity, field) {
        (AggregatedEntity::Class(class), Field::Name) => Some(&class.name),
        (AggregatedEntity::Class(class), Field::Description) => Some(&class.description),
        (AggregatedEntity::ClassProfile(profile), Field::Name) => Some(&profile.name),
        (AggregatedEntity::ClassProfile(profile), Field::Description) => {
            Some(&profile.description)
        }
        (AggregatedEntity::ClassProfile(profile), Field::UsageNote) => Some(&profile.usage_note),
        _ => None,
    }
}

/// Picks the profile's own value, or the value of the contributor named by `pointer`.
///
/// A pointer to an unknown contributor falls back to the own value; a known
/// contributor without the field yields an empty value.
fn resolve<'a, T>(
    own: &LanguageString,
    pointer: Option<&EntityId>,
    contributors: &'a [(&'a str, T)],
    lookup: impl Fn(&T) -> Option<&LanguageString>,
) -> LanguageString {
    let Some(pointer) = pointer else {
        return own.clone();
    };
    contributors
        .iter()
        .find(|(id, _)| *id == pointer.as_str())
        .map_or_else(
            || own.clone(),
            |(_, contributor)| lookup(contributor).cloned().unwrap_or_default(),
        )
}

fn push_unique(target: &mut Vec<String>, values: impl IntoIterator<Item = String>) {
    for value in values {
        if !target.contains(&value) {
            target.push(value);
        }
    }
}

/// Stateless merge of a profile with its resolved contributors.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProfileMergeEngine;

impl ProfileMergeEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Aggregates a class profile.
    ///
    /// `contributors` holds the resolved entities named in `profile.profiling`;
    /// unresolvable ones are simply absent.
    #[must_use]
    pub fn aggregate_class_profile(
        &self,
        profile: &SemanticModelClassProfile,
        contributors: &[&AggregatedEntity],
    ) -> AggregatedClassProfile {
        let keyed: Vec<(&str, &AggregatedEntity)> = contributors
            .iter()
            .map(|entity| (entity.id(), *entity))
            .collect();

        let mut concept_iris = Vec::new();
        for id in &profile.profiling {
            match keyed.iter().find(|(candidate, _)| *candidate == id.as_str()) {
                Some((_, AggregatedEntity::Class(class))) => {
                    push_unique(&mut concept_iris, class.iri.iter().cloned());
                }
                Some((_, AggregatedEntity::ClassProfile(parent))) => {
                    push_unique(&mut concept_iris, parent.concept_iris.iter().cloned());
                }
                _ => {}
            }
        }

        AggregatedClassProfile {
            id: profile.id.clone(),
            iri: profile.iri.clone(),
            profiling: profile.profiling.clone(),
            name: resolve(
                &profile.name,
                profile.name_from_profiled.as_ref(),
                &keyed,
                |entity| class_value(entity, Field::Name),
            ),
            name_from_profiled: profile.name_from_profiled.clone(),
            description: resolve(
                &profile.description,
                profile.description_from_profiled.as_ref(),
                &keyed,
                |entity| class_value(entity, Field::Description),
            ),
            description_from_profiled: profile.description_from_profiled.clone(),
            usage_note: resolve(
                &profile.usage_note,
                profile.usage_note_from_profiled.as_ref(),
                &keyed,
                |entity| class_value(entity, Field::UsageNote),
            ),
            usage_note_from_profiled: profile.usage_note_from_profiled.clone(),
            tags: profile.tags.clone(),
            concept_iris,
        }
    }

    /// Aggregates a relationship profile end by end.
    ///
    /// End `i` of the profile is merged with end `i` of every contributor its
    /// own profiling list names.
    #[must_use]
    pub fn aggregate_relationship_profile(
        &self,
        profile: &SemanticModelRelationshipProfile,
        contributors: &[&AggregatedEntity],
    ) -> AggregatedRelationshipProfile {
        let ends = profile
            .ends
            .iter()
            .enumerate()
            .map(|(index, end)| Self::aggregate_end(index, end, contributors))
            .collect();

        AggregatedRelationshipProfile {
            id: profile.id.clone(),
            ends,
        }
    }

    fn aggregate_end(
        index: usize,
        end: &SemanticModelRelationshipEndProfile,
        contributors: &[&AggregatedEntity],
    ) -> AggregatedRelationshipEndProfile {
        let sources: Vec<(&str, EndSource<'_>)> = end
            .profiling
            .iter()
            .filter_map(|id| contributors.iter().find(|entity| entity.id() == id.as_str()))
            .filter_map(|entity| {
                let source = match entity {
                    AggregatedEntity::Relationship(relationship) => {
                        EndSource::Vocabulary(relationship.ends.get(index)?)
                    }
                    AggregatedEntity::RelationshipProfile(parent) => {
                        EndSource::Profile(parent.ends.get(index)?)
                    }
                    _ => return None,
                };
                Some((entity.id(), source))
            })
            .collect();

        let mut concept_iris = Vec::new();
        for (_, source) in &sources {
            push_unique(&mut concept_iris, source.concept_iris());
        }

        let cardinality = Cardinality::intersect_all(
            end.cardinality
                .into_iter()
                .chain(sources.iter().filter_map(|(_, source)| source.cardinality())),
        );

        let concept = end.concept.clone().or_else(|| {
            sources
                .iter()
                .find_map(|(_, source)| source.concept().cloned())
        });

        AggregatedRelationshipEndProfile {
            iri: end.iri.clone(),
            profiling: end.profiling.clone(),
            name: resolve(
                &end.name,
                end.name_from_profiled.as_ref(),
                &sources,
                |source| source.value(Field::Name),
            ),
            name_from_profiled: end.name_from_profiled.clone(),
            description: resolve(
                &end.description,
                end.description_from_profiled.as_ref(),
                &sources,
                |source| source.value(Field::Description),
            ),
            description_from_profiled: end.description_from_profiled.clone(),
            usage_note: resolve(
                &end.usage_note,
                end.usage_note_from_profiled.as_ref(),
                &sources,
                |source| source.value(Field::UsageNote),
            ),
            usage_note_from_profiled: end.usage_note_from_profiled.clone(),
            cardinality,
            concept,
            tags: end.tags.clone(),
            concept_iris,
        }
    }
}
