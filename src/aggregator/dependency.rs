use std::collections::{BTreeMap, BTreeSet};

use crate::semantic_model::EntityId;

/// Bidirectional index of "first depends on second" pairs.
///
/// Forward and reverse maps are kept in sync so that replacing the edges of
/// one entity and looking up the dependents of another are both proportional
/// to the degree of the touched node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyTracker {
    forward: BTreeMap<EntityId, BTreeSet<EntityId>>,
    reverse: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl DependencyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces every edge leaving `first`.
    pub fn override_by_first<I, S>(&mut self, first: &str, seconds: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        self.delete_first(first);
        let seconds: BTreeSet<EntityId> = seconds.into_iter().map(Into::into).collect();
        if seconds.is_empty() {
            return;
        }
        for second in &seconds {
            self.reverse
                .entry(second.clone())
                .or_default()
                .insert(first.to_string());
        }
        self.forward.insert(first.to_string(), seconds);
    }

    /// Removes every edge leaving `first`.
    pub fn delete_first(&mut self, first: &str) {
        let Some(seconds) = self.forward.remove(first) else {
            return;
        };
        for second in seconds {
            if let Some(firsts) = self.reverse.get_mut(&second) {
                firsts.remove(first);
                if firsts.is_empty() {
                    self.reverse.remove(&second);
                }
            }
        }
    }

    /// Entities depending on `second`.
    #[must_use]
    pub fn get_by_second(&self, second: &str) -> Vec<EntityId> {
        self.reverse
            .get(second)
            .map(|firsts| firsts.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entities `first` depends on.
    #[must_use]
    pub fn get_by_first(&self, first: &str) -> Vec<EntityId> {
        self.forward
            .get(first)
            .map(|seconds| seconds.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, first: &str, second: &str) -> bool {
        self.forward
            .get(first)
            .is_some_and(|seconds| seconds.contains(second))
    }

    /// Number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Returns the dependency path from `from` to `to`, both included.
    ///
    /// A path from an entity to itself is that entity alone.
    #[must_use]
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<EntityId>> {
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut visited: BTreeSet<&str> = BTreeSet::from([from]);
        let mut stack: Vec<(&str, Vec<&str>)> = vec![(from, vec![from])];

        while let Some((current, path)) = stack.pop() {
            let Some(seconds) = self.forward.get(current) else {
                continue;
            };
            for second in seconds.iter().rev() {
                if second == to {
                    let mut found: Vec<EntityId> =
                        path.iter().map(|id| (*id).to_string()).collect();
                    found.push(to.to_string());
                    return Some(found);
                }
                if visited.insert(second.as_str()) {
                    let mut next = path.clone();
                    next.push(second.as_str());
                    stack.push((second.as_str(), next));
                }
            }
        }

        None
    }
}
