//! Sentence-aware text splitting for length-limited speech endpoints

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?\n]+").expect("valid sentence regex"));

/// Split `text` into trimmed, non-empty chunks of fewer than `limit` characters.
///
/// Sentences (ending in `.`, `!`, `?` or a newline) are packed greedily. A sentence
/// that alone reaches the limit is broken at whitespace, and a single word that does
/// is broken at character boundaries. Non-whitespace content is never dropped or
/// reordered.
pub fn split_into_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(2);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        if char_len(&current) + char_len(sentence) < limit {
            current.push_str(sentence);
            continue;
        }
        flush(&mut chunks, &mut current);
        if char_len(sentence.trim()) < limit {
            current.push_str(sentence);
        } else {
            chunks.extend(split_words(sentence, limit));
        }
    }
    flush(&mut chunks, &mut current);
    chunks
}

/// Sentences with their terminating punctuation attached
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        out.push(&text[start..m.end()]);
        start = m.end();
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn split_words(sentence: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        let sep = usize::from(!current.is_empty());
        if char_len(&current) + sep + char_len(word) < limit {
            if sep == 1 {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        flush(&mut pieces, &mut current);
        if char_len(word) < limit {
            current.push_str(word);
        } else {
            let chars: Vec<char> = word.chars().collect();
            for run in chars.chunks(limit - 1) {
                pieces.push(run.iter().collect());
            }
        }
    }
    flush(&mut pieces, &mut current);
    pieces
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
