use std::sync::LazyLock;

use regex::Regex;

static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3})\s*%").expect("percentage pattern is valid"));

static MARKUP_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s*%\s*(?:match|score)").expect("markup score pattern is valid")
});

fn first_in_range(pattern: &Regex, text: &str) -> Option<u8> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u8>().ok())
        .find(|score| *score <= 100)
}

/// First percentage within 0..=100 in visible text, e.g. "87% match".
pub fn percentage_in(text: &str) -> Option<u8> {
    first_in_range(&PERCENTAGE, text)
}

/// Secondary search over raw markup: only percentages followed by
/// "match" or "score" count, since markup is full of unrelated numbers.
pub fn score_in_markup(html: &str) -> Option<u8> {
    first_in_range(&MARKUP_SCORE, html)
}

/// Whether a result region plausibly holds comparison output.
pub fn looks_like_comparison(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("match") || lower.contains("keyword") || text.contains('%')
}

/// At most `max` characters of `text`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
