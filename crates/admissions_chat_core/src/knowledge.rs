//! crates/admissions_chat_core/src/knowledge.rs
//!
//! Keyword-scored retrieval over the static knowledge corpus. The corpus is
//! loaded once at process start and never changes, so retrieval is a plain
//! in-memory scoring pass with no error path.

use crate::domain::KnowledgeEntry;

/// Default number of entries returned by a search.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// The static knowledge corpus plus its scoring logic.
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scores every entry against `query` and returns the top `max_results`
    /// entries with a positive score, highest first.
    ///
    /// Entries with equal scores keep their corpus order (the sort is
    /// stable), so repeated calls with the same query always return the
    /// same sequence.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<KnowledgeEntry> {
        let query_lower = query.to_lowercase();

        let mut scored: Vec<(u32, &KnowledgeEntry)> = self
            .entries
            .iter()
            .map(|entry| (score_entry(entry, &query_lower), entry))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(max_results)
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}

fn score_entry(entry: &KnowledgeEntry, query_lower: &str) -> u32 {
    let title_lower = entry.title.to_lowercase();
    let text_lower = entry.text.to_lowercase();
    let mut score = 0;

    if title_lower.contains(query_lower) {
        score += 10;
    }

    for keyword in &entry.keywords {
        let keyword_lower = keyword.to_lowercase();
        if query_lower.contains(&keyword_lower) || keyword_lower.contains(query_lower) {
            score += 5;
        }
    }

    if text_lower.contains(query_lower) {
        score += 3;
    }

    // Per-word matching, ignoring short filler words.
    for word in query_lower.split_whitespace() {
        if word.len() > 3 {
            if entry.keywords.iter().any(|k| k.to_lowercase() == word) {
                score += 8;
            }
            if title_lower.contains(word) {
                score += 6;
            }
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, keywords: &[&str], text: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: id.to_string(),
            title: title.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            text: text.to_string(),
        }
    }

    fn sample_kb() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            entry(
                "kb-fees",
                "Tuition Fees",
                &["tuition", "fees", "cost"],
                "Undergraduate tuition is 9,250 GBP per year for home students.",
            ),
            entry(
                "kb-admissions",
                "Admissions Requirements",
                &["admissions", "requirements", "apply"],
                "Applicants need three A-levels or equivalent qualifications.",
            ),
            entry(
                "kb-accommodation",
                "Student Accommodation",
                &["accommodation", "housing", "halls"],
                "On-campus halls of residence are available for first-year students.",
            ),
        ])
    }

    #[test]
    fn tuition_query_ranks_fees_entry_first() {
        let kb = sample_kb();
        let results = kb.search(
            "What are the tuition fees for undergraduate programs?",
            DEFAULT_MAX_RESULTS,
        );
        assert!(!results.is_empty());
        assert_eq!(results[0].id, "kb-fees");
    }

    #[test]
    fn unmatched_query_returns_empty() {
        let kb = sample_kb();
        let results = kb.search("weather forecast", DEFAULT_MAX_RESULTS);
        assert!(results.is_empty());
    }

    #[test]
    fn repeated_search_is_deterministic() {
        let kb = sample_kb();
        let first: Vec<String> = kb
            .search("admissions requirements", 3)
            .into_iter()
            .map(|e| e.id)
            .collect();
        let second: Vec<String> = kb
            .search("admissions requirements", 3)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn equal_scores_preserve_corpus_order() {
        // Both entries share the one matching keyword and nothing else, so
        // they tie; the corpus order must decide.
        let kb = KnowledgeBase::new(vec![
            entry("kb-a", "Alpha", &["campus"], "First entry."),
            entry("kb-b", "Beta", &["campus"], "Second entry."),
        ]);
        let results = kb.search("campus", DEFAULT_MAX_RESULTS);
        let ids: Vec<&str> = results.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["kb-a", "kb-b"]);
    }

    #[test]
    fn results_truncate_to_max() {
        let kb = KnowledgeBase::new(vec![
            entry("kb-1", "Campus Map", &["campus"], "Map."),
            entry("kb-2", "Campus Tours", &["campus"], "Tours."),
            entry("kb-3", "Campus Shops", &["campus"], "Shops."),
        ]);
        let results = kb.search("campus", 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn exact_keyword_word_outscores_plain_keyword_overlap() {
        // "tuition" as a standalone long word hits both the keyword-substring
        // rule (+5) and the exact-keyword-word rule (+8).
        let kb = KnowledgeBase::new(vec![
            entry("kb-x", "Fees", &["tuition"], "About money."),
            entry("kb-y", "Other", &["tui"], "Unrelated."),
        ]);
        let results = kb.search("tuition costs", DEFAULT_MAX_RESULTS);
        assert_eq!(results[0].id, "kb-x");
    }
}
