//! Text normalization and tokenization shared by every engine.
//!
//! Normalization lowercases, drops punctuation and collapses whitespace.
//! Dropping (rather than replacing) punctuation is applied character by
//! character, so case- and punctuation-insensitive containment is preserved:
//! if `b` occurs in `a` ignoring case, `normalize(b)` occurs in `normalize(a)`.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Stopwords dropped before building term vectors.
const STOPWORDS_EN: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "nor", "for", "yet", "so", "i", "you", "he", "she", "it",
    "we", "they", "me", "him", "her", "us", "them", "my", "your", "his", "its", "our", "their",
    "mine", "yours", "hers", "ours", "theirs", "this", "that", "these", "those", "who", "whom",
    "which", "what", "whose", "is", "am", "are", "was", "were", "be", "been", "being", "have",
    "has", "had", "having", "do", "does", "did", "doing", "will", "would", "shall", "should",
    "can", "could", "may", "might", "in", "on", "at", "to", "from", "by", "with", "about",
    "against", "between", "into", "through", "during", "before", "after", "above", "below", "up",
    "down", "out", "off", "over", "under", "again", "further", "here", "there", "where", "when",
    "why", "how", "all", "each", "both", "few", "more", "most", "other", "some", "any", "only",
    "own", "same", "than", "too", "very", "just", "also", "then", "once", "if", "because", "as",
    "until", "while", "of", "s", "t", "ve", "re", "ll", "d", "m", "im", "ok", "okay", "yes",
    "oh", "um", "uh",
];

static STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS_EN.iter().copied().collect());

/// True if `word` (already lowercase) is on the stopword list.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Lowercase, drop punctuation, collapse whitespace, trim.
pub fn normalize(text: &str) -> String {
    normalize_with_offsets(text).0
}

/// Like [`normalize`], also returning for every byte of the normalized string
/// the byte offset in `text` of the character it came from. A collapsed
/// whitespace run maps to its first whitespace character.
pub fn normalize_with_offsets(text: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(text.len());
    let mut offsets = Vec::with_capacity(text.len());
    let mut pending_space: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if pending_space.is_none() {
                pending_space = Some(idx);
            }
            continue;
        }
        if !ch.is_alphanumeric() {
            continue;
        }
        if let Some(space_idx) = pending_space.take() {
            if !out.is_empty() {
                out.push(' ');
                offsets.push(space_idx);
            }
        }
        for lower in ch.to_lowercase() {
            let before = out.len();
            out.push(lower);
            offsets.extend(std::iter::repeat(idx).take(out.len() - before));
        }
    }

    (out, offsets)
}

/// Tokens for term-frequency vectors: normalized words minus stopwords.
pub fn index_terms(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| !is_stopword(w))
        .map(|w| w.to_string())
        .collect()
}

/// A word token with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn lower(&self) -> String {
        self.text.to_lowercase()
    }
}

/// Splits `text` into maximal alphanumeric runs (apostrophes inside words kept,
/// so "don't" stays one token).
pub fn word_tokens(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let inner_apostrophe = (ch == '\'' || ch == '’')
            && start.is_some()
            && chars.peek().is_some_and(|(_, next)| next.is_alphanumeric());
        if ch.is_alphanumeric() || inner_apostrophe {
            if start.is_none() {
                start = Some(idx);
            }
        } else if let Some(s) = start.take() {
            tokens.push(Token {
                text: &text[s..idx],
                start: s,
                end: idx,
            });
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            text: &text[s..],
            start: s,
            end: text.len(),
        });
    }

    tokens
}

/// Lowercased words with apostrophes removed ("Don't" -> "dont").
pub fn lower_words(text: &str) -> Vec<String> {
    word_tokens(text)
        .iter()
        .map(|t| t.lower().replace(['\'', '’'], ""))
        .collect()
}

/// Counts occurrences of `phrase` starting on a word boundary, so "card"
/// also counts inside "cards" and "cardholder".
pub fn count_word_prefix(normalized: &str, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    let padded = format!(" {}", normalized);
    let needle = format!(" {}", phrase);
    padded.matches(needle.as_str()).count()
}

/// Counts phrase occurrences on word boundaries within normalized text.
pub fn count_phrase(normalized: &str, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    let padded = format!(" {} ", normalized);
    let needle = format!(" {} ", phrase);
    let mut count = 0;
    let mut from = 0;
    while let Some(pos) = padded[from..].find(&needle) {
        count += 1;
        // Step past the leading space only, so adjacent repeats still match.
        from += pos + needle.len() - 1;
    }
    count
}

/// Number of sentences, approximated by terminal punctuation (at least 1).
pub fn sentence_count(text: &str) -> usize {
    let mut count = 0;
    let mut in_terminal = false;
    for ch in text.chars() {
        let terminal = matches!(ch, '.' | '!' | '?');
        if terminal && !in_terminal {
            count += 1;
        }
        in_terminal = terminal;
    }
    let trailing_clause = text
        .trim_end()
        .chars()
        .last()
        .is_some_and(|c| !matches!(c, '.' | '!' | '?'));
    if trailing_clause {
        count += 1;
    }
    count.max(1)
}
