/// Cuts `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate_detail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = text[..cut].trim_end().to_string();
            truncated.push('…');
            truncated
        }
        None => text.to_string(),
    }
}
