use regex::{Regex, RegexBuilder};

use super::AggregatedEntity;

/// Case-insensitive label matcher.
///
/// A query that is a valid regular expression is used as such, anything else
/// is matched literally.
pub(crate) struct SearchMatcher {
    regex: Regex,
}

impl SearchMatcher {
    pub(crate) fn new(query: &str) -> Self {
        let query = query.trim();
        let regex = RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(query))
                    .case_insensitive(true)
                    .build()
            })
            .unwrap_or_else(|_| Regex::new("$^").expect("static pattern"));
        Self { regex }
    }

    /// Relevance of `label`: 3 for a full match, 2 for a prefix, 1 for a
    /// match anywhere, `None` otherwise.
    pub(crate) fn score(&self, label: &str) -> Option<u8> {
        let found = self.regex.find(label)?;
        Some(if found.start() == 0 && found.end() == label.len() {
            3
        } else if found.start() == 0 {
            2
        } else {
            1
        })
    }

    /// Best score across every language of a class or class profile label.
    pub(crate) fn score_entity(&self, entity: &AggregatedEntity) -> Option<u8> {
        entity
            .class_name()?
            .values()
            .filter_map(|label| self.score(label))
            .max()
    }
}

/// Sorts scored hits by descending relevance, ties broken by identifier.
pub(crate) fn rank<T>(mut hits: Vec<(u8, String, T)>) -> Vec<T> {
    hits.sort_by(|(left_score, left_id, _), (right_score, right_id, _)| {
        right_score.cmp(left_score).then_with(|| left_id.cmp(right_id))
    });
    hits.into_iter().map(|(_, _, hit)| hit).collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{rank, SearchMatcher};
    use crate::aggregator::AggregatedEntity;
    use crate::semantic_model::SemanticModelClass;

    #[rstest]
    #[case("dataset", "Dataset", Some(3))]
    #[case("data", "Dataset", Some(2))]
    #[case("set", "Dataset", Some(1))]
    #[case("catalog", "Dataset", None)]
    #[case("^Data.*", "Dataset", Some(3))]
    #[case("(", "Open (draft)", Some(1))]
    fn scores_labels(#[case] query: &str, #[case] label: &str, #[case] expected: Option<u8>) {
        assert_eq!(SearchMatcher::new(query).score(label), expected);
    }

    #[test]
    fn entity_score_takes_best_language() {
        let entity = AggregatedEntity::Class(
            SemanticModelClass::new("c")
                .with_name("cs", "Datová sada")
                .with_name("en", "Dataset"),
        );
        assert_eq!(SearchMatcher::new("dataset").score_entity(&entity), Some(3));
    }

    #[test]
    fn ranks_by_score_then_id() {
        let ranked = rank(vec![
            (1, "b".to_string(), "b"),
            (3, "z".to_string(), "z"),
            (1, "a".to_string(), "a"),
        ]);
        assert_eq!(ranked, vec!["z", "a", "b"]);
    }
}
