use std::sync::LazyLock;

use regex::Regex;

static FOOTNOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d+\]").unwrap());

/// Strip `[12]`-style footnote markers, replace non-breaking spaces, and
/// collapse whitespace runs to single spaces.
pub fn clean_text(value: &str) -> String {
    let stripped = FOOTNOTE.replace_all(value, "");
    let mut output = String::with_capacity(stripped.len());
    let mut previous_was_space = false;
    for ch in stripped.chars() {
        if ch.is_whitespace() || ch == '\u{a0}' {
            if !previous_was_space {
                output.push(' ');
                previous_was_space = true;
            }
        } else {
            output.push(ch);
            previous_was_space = false;
        }
    }
    output.trim().to_string()
}

const COUNT_WORDS: [&str; 20] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty",
];

/// Resolve a leading count word ("One at Harper's Ferry" -> 1).
///
/// Closed vocabulary: only the first whitespace-delimited token is
/// considered, and only "one".."twenty" resolve. Non-alphabetic edges of
/// that token are trimmed on purpose, so "One," and "Two:" still resolve.
/// Phrases like "Over twenty" or "Several" yield `None`, which callers
/// must treat as "no structured quantity", not zero.
pub fn leading_count_word(text: &str) -> Option<u32> {
    let token = text.split_whitespace().next()?;
    let token = token.trim_matches(|ch: char| !ch.is_ascii_alphabetic());
    COUNT_WORDS
        .iter()
        .position(|word| token.eq_ignore_ascii_case(word))
        .map(|index| index as u32 + 1)
}
