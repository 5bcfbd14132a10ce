//! Free-text query to predicate builder.
//!
//! # Responsibility
//! - Tokenize user queries into folded letter-only words.
//! - Build `phrase OR (word_1 AND ... AND word_n)` predicates.
//!
//! # Invariants
//! - Blank queries produce no predicate (never "match everything").
//! - Each word may match in a different field of the same memory.

use crate::db::functions::fold_text;
use crate::search::predicate::Predicate;
use once_cell::sync::Lazy;
use regex::Regex;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").expect("valid word regex"));

/// Splits a query into folded letter runs.
///
/// Digits, punctuation and whitespace separate words and are dropped.
pub fn tokenize(query: &str) -> Vec<String> {
    let folded = fold_text(query);
    WORD_RE
        .find_iter(&folded)
        .map(|word| word.as_str().to_string())
        .collect()
}

/// Builds the search predicate for a free-text query.
///
/// Returns `None` when the folded query is empty or whitespace-only, which
/// includes queries made of combining marks alone.
pub fn build_search_predicate(query: &str) -> Option<Predicate> {
    let folded = fold_text(query);
    let phrase = folded.trim();
    if phrase.is_empty() {
        return None;
    }

    let phrase_predicate = Predicate::contains(phrase);
    let words = tokenize(phrase);
    if words.is_empty() {
        return Some(phrase_predicate);
    }

    let all_words = Predicate::And(
        words
            .iter()
            .map(|word| Predicate::contains(word))
            .collect(),
    );
    Some(Predicate::Or(vec![phrase_predicate, all_words]))
}
