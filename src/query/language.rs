//! Language rules for search term normalization

use std::collections::HashSet;

/// Words that never make it into the index or a query
const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "an", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he", "her", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "me", "my", "no", "not", "o", "of", "on",
    "our", "she", "so", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "was", "we", "were", "what", "when", "where", "which", "who", "why", "will",
    "with", "you", "your",
];

/// Stop-word filtering rules for one configured language
#[derive(Debug, Clone)]
pub struct Language {
    stop_words: HashSet<String>,
}

impl Default for Language {
    fn default() -> Self {
        Language::new()
    }
}

impl Language {
    /// Language rules with the built-in stop-word list
    pub fn new() -> Self {
        Language {
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Extend the built-in list with extra stop words
    pub fn with_extra_stop_words<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut language = Language::new();
        language
            .stop_words
            .extend(extra.into_iter().map(|w| w.into().to_lowercase()));
        language
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

/// Clean a raw token the way the indexer's parser does: strip surrounding
/// punctuation, lowercase, drop stop words, enforce the configured length
/// bounds. Returns `None` when nothing indexable remains.
pub fn normalize_term(
    raw: &str,
    language: &Language,
    max_word_length: usize,
    min_word_length: usize,
) -> Option<String> {
    let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_lowercase();
    if language.is_stop_word(&lowered) {
        return None;
    }

    if lowered.chars().count() < min_word_length {
        return None;
    }

    // Overlong tokens are truncated, not rejected
    if lowered.chars().count() > max_word_length {
        return Some(lowered.chars().take(max_word_length).collect());
    }

    Some(lowered)
}
