/// Render the denormalized summary stored on every feed row: whitespace is
/// collapsed and the result is cut to `max_chars` characters, ending in `…`
/// when anything was dropped.
pub fn summarize(content: &str, max_chars: usize) -> String {
    let cleaned = content.split_whitespace().collect::<Vec<_>>().join(" ");

    if max_chars == 0 {
        return String::new();
    }
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }

    let mut summary: String = cleaned.chars().take(max_chars - 1).collect();
    let trimmed_len = summary.trim_end().len();
    summary.truncate(trimmed_len);
    summary.push('…');
    summary
}
