//! Text helpers shared by every component that renders strings.

/// Characters reserved by the host workflow language. Generated text never contains them.
pub const RESERVED_CHARS: [char; 6] = ['[', ']', '{', '}', '(', ')'];

/// Default preview length, in characters.
pub const PREVIEW_CHARS: usize = 80;

/// Replace reserved characters with spaces and collapse whitespace.
pub fn scrub_brackets(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    collapse_whitespace(&replaced)
}

/// Whether the text is free of reserved characters.
pub fn is_bracket_free(text: &str) -> bool {
    !text.chars().any(|c| RESERVED_CHARS.contains(&c))
}

/// Lowercase, trim and collapse whitespace. Used for fingerprints and dedup keys.
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}

/// A scrubbed, single-line preview truncated to `max_chars` characters.
pub fn preview(text: &str, max_chars: usize) -> String {
    let clean = scrub_brackets(text);
    if clean.chars().count() <= max_chars {
        return clean;
    }
    let cut: String = clean.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Small counts spelled out, larger ones as digits.
pub fn number_word(count: usize) -> String {
    const WORDS: [&str; 13] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve",
    ];
    WORDS
        .get(count)
        .map(|w| w.to_string())
        .unwrap_or_else(|| count.to_string())
}

/// Uppercase the first character.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A sentence that counts something, e.g. "Two rules active.".
///
/// `none` is used as-is for zero; `singular` and `plural` follow the
/// spelled-out count.
pub fn count_sentence(count: usize, none: &str, singular: &str, plural: &str) -> String {
    match count {
        0 => none.to_string(),
        1 => format!("One {}", singular),
        n => format!("{} {}", capitalize(&number_word(n)), plural),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
