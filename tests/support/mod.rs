#![allow(dead_code)]

use std::{collections::BTreeSet, sync::Mutex};

use async_trait::async_trait;
use semantic_aggregator::{
    aggregator::ExternalSemanticModelSource,
    semantic_model::{
        Cardinality, Iri, SemanticModelClass, SemanticModelEntity, SemanticModelGeneralization,
        SemanticModelRelationship, SemanticModelRelationshipEnd,
    },
    Error, Result,
};

/// Query the in-memory source answers with a transport failure.
pub const UNREACHABLE: &str = "unreachable";

pub const DCAT: &str = "http://www.w3.org/ns/dcat#";

pub fn class(id: &str, name: &str) -> SemanticModelEntity {
    SemanticModelClass::new(id)
        .with_iri(format!("{DCAT}{id}"))
        .with_name("en", name)
        .into()
}

pub fn relationship(id: &str, domain: &str, range: &str) -> SemanticModelEntity {
    let range = SemanticModelRelationshipEnd::new(range)
        .with_iri(format!("{DCAT}{id}"))
        .with_name("en", id)
        .with_cardinality(Cardinality::new(0, None));
    SemanticModelRelationship::new(id, SemanticModelRelationshipEnd::new(domain), range).into()
}

/// In-memory stand-in for a remote vocabulary endpoint.
pub struct InMemorySource {
    entities: Vec<SemanticModelEntity>,
    pub calls: Mutex<Vec<String>>,
}

impl InMemorySource {
    pub fn new(entities: Vec<SemanticModelEntity>) -> Self {
        Self {
            entities,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `dataset` and `catalog` specialize `resource`; `publisher` is declared
    /// on `resource`, `distribution` on `dataset`.
    pub fn dcat() -> Self {
        Self::new(vec![
            class("resource", "Catalogued Resource"),
            class("dataset", "Dataset"),
            class("catalog", "Catalog"),
            class("agent", "Agent"),
            class("distribution", "Distribution"),
            SemanticModelGeneralization::new("g-dataset", "dataset", "resource").into(),
            SemanticModelGeneralization::new("g-catalog", "catalog", "dataset").into(),
            relationship("publisher", "resource", "agent"),
            relationship("distribution-of", "dataset", "distribution"),
        ])
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("calls").push(call);
    }

    fn id_of(&self, iri: &Iri) -> Option<String> {
        self.entities
            .iter()
            .find(|entity| {
                matches!(entity, SemanticModelEntity::Class(_)) && entity.iri() == Some(iri.as_str())
            })
            .map(|entity| entity.id().to_string())
    }

    fn generalizations(&self) -> impl Iterator<Item = &SemanticModelGeneralization> {
        self.entities.iter().filter_map(|entity| match entity {
            SemanticModelEntity::Generalization(generalization) => Some(generalization),
            _ => None,
        })
    }

    fn closure(&self, start: &str, upward: bool) -> BTreeSet<String> {
        let mut found = BTreeSet::from([start.to_string()]);
        let mut stack = vec![start.to_string()];
        while let Some(current) = stack.pop() {
            for generalization in self.generalizations() {
                let (from, to) = if upward {
                    (&generalization.child, &generalization.parent)
                } else {
                    (&generalization.parent, &generalization.child)
                };
                if *from == current && found.insert(to.clone()) {
                    stack.push(to.clone());
                }
            }
        }
        found
    }
}

#[async_trait]
impl ExternalSemanticModelSource for InMemorySource {
    async fn search(&self, query: &str) -> Result<Vec<SemanticModelEntity>> {
        self.log(format!("search:{query}"));
        if query == UNREACHABLE {
            return Err(Error::Source(String::from("endpoint did not respond")));
        }
        let query = query.to_lowercase();
        Ok(self
            .entities
            .iter()
            .filter(|entity| match entity {
                SemanticModelEntity::Class(class) => class
                    .name
                    .values()
                    .any(|label| label.to_lowercase().contains(&query)),
                _ => false,
            })
            .cloned()
            .collect())
    }

    async fn get_surroundings(&self, iri: &Iri) -> Result<Vec<SemanticModelEntity>> {
        self.log(format!("surroundings:{iri}"));
        let Some(id) = self.id_of(iri) else {
            return Ok(Vec::new());
        };
        let scope = self.closure(&id, true);

        let mut ends = BTreeSet::new();
        let mut result = Vec::new();
        for entity in &self.entities {
            if let SemanticModelEntity::Relationship(relationship) = entity {
                let concepts: Vec<&String> = relationship
                    .ends
                    .iter()
                    .filter_map(|end| end.concept.as_ref())
                    .collect();
                if concepts.iter().any(|concept| scope.contains(*concept)) {
                    ends.extend(concepts.into_iter().cloned());
                    result.push(entity.clone());
                }
            }
        }
        result.extend(
            self.entities
                .iter()
                .filter(|entity| {
                    matches!(entity, SemanticModelEntity::Class(_)) && ends.contains(entity.id())
                })
                .cloned(),
        );
        Ok(result)
    }

    async fn get_full_hierarchy(&self, iri: &Iri) -> Result<Vec<SemanticModelEntity>> {
        self.log(format!("hierarchy:{iri}"));
        let Some(id) = self.id_of(iri) else {
            return Ok(Vec::new());
        };
        let mut scope = self.closure(&id, true);
        scope.extend(self.closure(&id, false));

        Ok(self
            .entities
            .iter()
            .filter(|entity| match entity {
                SemanticModelEntity::Class(class) => scope.contains(&class.id),
                SemanticModelEntity::Generalization(generalization) => {
                    scope.contains(&generalization.child) && scope.contains(&generalization.parent)
                }
                _ => false,
            })
            .cloned()
            .collect())
    }
}
