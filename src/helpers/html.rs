//! HTML and plain-text helpers

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("valid tag regex");
    static ref DIRECTIVE: Regex =
        Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}").expect("valid directive regex");
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape for XML text and attribute content
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Strip HTML tags and comments from a string
pub fn strip_html(s: &str) -> String {
    TAG.replace_all(s, "").into_owned()
}

/// Remove template directives (`{{ ... }}`, `{% ... %}`)
pub fn strip_directives(s: &str) -> String {
    DIRECTIVE.replace_all(s, "").into_owned()
}

/// Collapse every whitespace run into a single space
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string to `length` characters including the omission marker
pub fn truncate(s: &str, length: usize, omission: &str) -> String {
    if s.chars().count() <= length {
        return s.to_string();
    }
    let keep = length.saturating_sub(omission.chars().count());
    let truncated: String = s.chars().take(keep).collect();
    format!("{}{}", truncated, omission)
}

/// Keep the first `count` words
pub fn truncate_words(s: &str, count: usize, omission: &str) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= count {
        return words.join(" ");
    }
    format!("{}{}", words[..count.max(1)].join(" "), omission)
}

/// Cut text to at most `max` characters, ending on a word boundary.
///
/// Whitespace is collapsed first. Words are never split: when the first word
/// alone is longer than `max` the result is empty.
pub fn truncate_at_word(s: &str, max: usize) -> String {
    let text = collapse_whitespace(s);
    if text.chars().count() <= max {
        return text;
    }

    let mut out = String::new();
    let mut len = 0;
    for word in text.split(' ') {
        let word_len = word.chars().count();
        let needed = if out.is_empty() { word_len } else { word_len + 1 };
        if len + needed > max {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        len += needed;
    }
    out
}
