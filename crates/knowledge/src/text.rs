use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Words ignored when scoring lexical overlap.
pub const STOPWORDS: &[&str] = &[
    "the", "is", "at", "where", "can", "i", "get", "to", "my", "a", "an", "on", "of", "for",
    "and", "how", "do", "you", "in", "office",
];

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b\w+\b").unwrap())
}

fn punctuation_regex() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| Regex::new(r"[^\w\s]").unwrap())
}

/// Lowercased and trimmed.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Distinct lowercase word tokens with stopwords removed.
pub fn content_words(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    word_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| !is_stopword(word))
        .map(str::to_string)
        .collect()
}

/// Form used for query embeddings: punctuation removed, lowercased, trimmed.
pub fn strip_punctuation(text: &str) -> String {
    normalize(&punctuation_regex().replace_all(text, ""))
}
