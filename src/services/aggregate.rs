//! Label distribution over result sets and corpora.

use crate::models::{LabelCount, LabelDistribution, SearchResult};

/// Count labels in first-seen order.
pub fn count_labels<'a, I>(labels: I) -> LabelDistribution
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<LabelCount> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|c| c.label == label) {
            Some(entry) => entry.count += 1,
            None => counts.push(LabelCount {
                label: label.to_string(),
                count: 1,
            }),
        }
    }
    LabelDistribution { counts }
}

/// Label distribution of a result set.
pub fn summarize(results: &[SearchResult]) -> LabelDistribution {
    count_labels(results.iter().map(|r| r.label.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, label: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            score: 0.5,
            content: String::new(),
            label: label.to_string(),
        }
    }

    #[test]
    fn test_summarize_first_seen_order() {
        let results = vec![
            result("comment_4", "Negative"),
            result("comment_1", "Positive"),
            result("comment_9", "Negative"),
            result("comment_2", "Neutral"),
        ];

        let dist = summarize(&results);
        let pairs: Vec<(&str, usize)> = dist.iter().collect();
        assert_eq!(pairs, vec![("Negative", 2), ("Positive", 1), ("Neutral", 1)]);
        assert_eq!(dist.total(), results.len());
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn test_count_labels_keeps_empty_label() {
        let dist = count_labels(["", "Positive", ""]);
        assert_eq!(dist.get(""), 2);
        assert_eq!(dist.len(), 2);
    }
}
