//! Traversal helpers over generalization edges.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::entities::{SemanticModelEntity, SemanticModelGeneralization};

/// Finds the generalizations leading from `from` up to its ancestor `to`.
///
/// Walks child to parent edges breadth first, so the shortest chain wins.
/// Returns an empty path when both ends are the same class and `None` when
/// `to` is not an ancestor of `from`.
#[must_use]
pub fn find_generalization_path<'a, I>(
    entities: I,
    from: &str,
    to: &str,
) -> Option<Vec<SemanticModelGeneralization>>
where
    I: IntoIterator<Item = &'a SemanticModelEntity>,
{
    if from == to {
        return Some(Vec::new());
    }

    let mut parents: BTreeMap<&str, Vec<&SemanticModelGeneralization>> = BTreeMap::new();
    for entity in entities {
        if let SemanticModelEntity::Generalization(generalization) = entity {
            parents
                .entry(generalization.child.as_str())
                .or_default()
                .push(generalization);
        }
    }

    let mut visited = BTreeSet::from([from]);
    let mut queue: VecDeque<(&str, Vec<&SemanticModelGeneralization>)> =
        VecDeque::from([(from, Vec::new())]);

    while let Some((current, path)) = queue.pop_front() {
        let Some(edges) = parents.get(current) else {
            continue;
        };
        for edge in edges {
            let mut next_path = path.clone();
            next_path.push(*edge);
            if edge.parent == to {
                return Some(next_path.into_iter().cloned().collect());
            }
            if visited.insert(edge.parent.as_str()) {
                queue.push_back((edge.parent.as_str(), next_path));
            }
        }
    }

    None
}

/// Collects the classes and generalizations forming the inheritance chain
/// between `from` and its ancestor `to`, ready to be copied into another store.
///
/// Both end classes are included when present in `hierarchy`.
#[must_use]
pub fn copy_inheritance(
    hierarchy: &[SemanticModelEntity],
    from: &str,
    to: &str,
) -> Option<Vec<SemanticModelEntity>> {
    let path = find_generalization_path(hierarchy, from, to)?;

    let mut class_ids: BTreeSet<&str> = BTreeSet::from([from, to]);
    for generalization in &path {
        class_ids.insert(generalization.child.as_str());
        class_ids.insert(generalization.parent.as_str());
    }

    let mut result: Vec<SemanticModelEntity> = hierarchy
        .iter()
        .filter(|entity| {
            matches!(entity, SemanticModelEntity::Class(_)) && class_ids.contains(entity.id())
        })
        .cloned()
        .collect();
    result.extend(path.into_iter().map(SemanticModelEntity::from));
    Some(result)
}
