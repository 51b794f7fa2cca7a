//! Lexical matcher: picks the knowledge entry that best answers a chat query.
//!
//! Two phases, the first one that produces a result wins:
//!
//! 1. **Substring** – the first entry (in store order) whose lowercased question contains the
//!    lowercased query, or is contained in it.
//! 2. **Keyword overlap** – query words longer than three characters are counted against the
//!    lowercased `question + " " + answer` of each entry; the strictly highest non-zero count
//!    wins, so ties go to the earlier entry.
//!
//! There is no stemming and no punctuation stripping.

use super::KnowledgeEntry;

/// Shortest query word (in characters) that takes part in keyword overlap.
pub const MIN_KEYWORD_LEN: usize = 4;

/// Returns the best entry for `query`, or `None` when nothing overlaps.
///
/// An empty query matches the first entry, since the empty string is a substring of every
/// question.
pub fn find_best_match<'a>(query: &str, entries: &'a [KnowledgeEntry]) -> Option<&'a KnowledgeEntry> {
    let query = query.to_lowercase();

    let by_substring = entries.iter().find(|entry| {
        let question = entry.question.to_lowercase();
        question.contains(&query) || query.contains(&question)
    });
    if by_substring.is_some() {
        return by_substring;
    }

    let keywords: Vec<&str> = query
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
        .collect();
    if keywords.is_empty() {
        return None;
    }

    let mut best: Option<&KnowledgeEntry> = None;
    let mut best_count = 0usize;
    for entry in entries {
        let haystack = format!("{} {}", entry.question, entry.answer).to_lowercase();
        let count = keywords.iter().filter(|word| haystack.contains(**word)).count();
        if count > best_count {
            best_count = count;
            best = Some(entry);
        }
    }
    best
}

/// Seam between the conversation and the match algorithm.
pub trait Matcher: Send + Sync {
    fn find_best_match<'a>(&self, query: &str, entries: &'a [KnowledgeEntry]) -> Option<&'a KnowledgeEntry>;
}

/// The production [`Matcher`]: delegates to [`find_best_match`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalMatcher;

impl Matcher for LexicalMatcher {
    fn find_best_match<'a>(&self, query: &str, entries: &'a [KnowledgeEntry]) -> Option<&'a KnowledgeEntry> {
        find_best_match(query, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, q: &str, a: &str) -> KnowledgeEntry {
        KnowledgeEntry::with_id(id, q, a)
    }

    fn idempiere() -> Vec<KnowledgeEntry> {
        vec![
            entry("1", "¿Qué es iDempiere?", "iDempiere es un software ERP de código abierto."),
            entry("2", "¿Cómo instalar iDempiere?", "Descargue el instalador y configure PostgreSQL."),
            entry("3", "¿Cómo crear un nuevo usuario?", "Acceda a Seguridad y luego Usuario/Contraseñas."),
        ]
    }

    #[test]
    fn exact_question_matches_itself_case_insensitively() {
        let entries = idempiere();
        for e in &entries {
            let upper = e.question.to_uppercase();
            let found = find_best_match(&upper, &entries).map(|m| m.id.clone());
            assert_eq!(found, Some(e.id.clone()), "query {:?}", upper);
        }
    }

    #[test]
    fn empty_query_returns_first_entry() {
        let entries = idempiere();
        assert_eq!(find_best_match("", &entries).and_then(|e| e.id()), Some("1"));
    }

    #[test]
    fn no_entries_never_match() {
        assert!(find_best_match("", &[]).is_none());
        assert!(find_best_match("instalar idempiere", &[]).is_none());
    }

    #[test]
    fn query_containing_the_question_matches() {
        let entries = vec![entry("a", "reset password", "Use the forgot-password link.")];
        let found = find_best_match("How do I RESET PASSWORD today?", &entries);
        assert_eq!(found.and_then(|e| e.id()), Some("a"));
    }

    #[test]
    fn substring_phase_wins_over_higher_keyword_overlap() {
        let entries = vec![
            entry("kw", "printer drivers", "printer drivers printer queue settings"),
            entry("sub", "queue", "Queues are under Settings."),
        ];
        // "queue" is a substring of the query, so entry "sub" wins even though "kw" shares more words.
        let found = find_best_match("printer queue settings", &entries);
        assert_eq!(found.and_then(|e| e.id()), Some("sub"));
    }

    #[test]
    fn keyword_phase_picks_highest_overlap() {
        let entries = idempiere();
        let found = find_best_match("necesito configurar postgresql para instalar", &entries);
        assert_eq!(found.and_then(|e| e.id()), Some("2"));
    }

    #[test]
    fn keyword_ties_go_to_the_earlier_entry() {
        let entries = vec![
            entry("first", "alpha topic", "mentions invoice"),
            entry("second", "beta topic", "mentions invoice too"),
        ];
        let found = find_best_match("where is my invoice", &entries);
        assert_eq!(found.and_then(|e| e.id()), Some("first"));
    }

    #[test]
    fn short_words_do_not_count_as_keywords() {
        let entries = idempiere();
        assert!(find_best_match("es un la de", &entries).is_none());
    }

    #[test]
    fn unrelated_query_has_no_match() {
        let entries = idempiere();
        assert!(find_best_match("weather forecast tomorrow", &entries).is_none());
    }

    #[test]
    fn punctuation_is_not_stripped() {
        let entries = vec![entry("1", "billing cycle", "Monthly.")];
        // "billing?" is not a substring of "billing cycle monthly."
        assert!(find_best_match("billing?", &entries).is_none());
        assert_eq!(find_best_match("billing", &entries).and_then(|e| e.id()), Some("1"));
    }

    #[test]
    fn accented_query_matches_spanish_question() {
        let entries = vec![entry("x", "¿Qué es X?", "X es ...")];
        let found = find_best_match("qué es x", &entries);
        assert_eq!(found.map(|e| e.answer.as_str()), Some("X es ..."));
    }

    #[test]
    fn lexical_matcher_delegates() {
        let entries = idempiere();
        let m = LexicalMatcher;
        assert_eq!(
            m.find_best_match("¿qué es idempiere?", &entries).and_then(|e| e.id()),
            Some("1")
        );
    }
}
