//! Greedy word-wrap and fixed-leading pagination.
//!
//! Widths are measured in characters; callers derive the limit from page
//! geometry and an average glyph width.

/// Wraps `text` so no line exceeds `max_chars_per_line`, except a single
/// token longer than the limit, which gets a line of its own.
///
/// Each input line is wrapped independently. A blank input line is kept as
/// an empty output line so paragraph breaks still take vertical space.
pub fn wrap(text: &str, max_chars_per_line: usize) -> Vec<String> {
    let max = max_chars_per_line.max(1);
    let mut lines = Vec::new();

    for input_line in text.lines() {
        let mut current = String::new();
        let mut current_len = 0usize;
        let mut has_token = false;

        for token in input_line.split_whitespace() {
            let token_len = token.chars().count();
            if !has_token {
                current.push_str(token);
                current_len = token_len;
                has_token = true;
            } else if current_len + 1 + token_len <= max {
                current.push(' ');
                current.push_str(token);
                current_len += 1 + token_len;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(token);
                current_len = token_len;
            }
        }

        // A line holding only whitespace is a paragraph break.
        lines.push(current);
    }

    lines
}

/// Splits `lines` into pages of at most `lines_per_page` lines.
///
/// Always returns at least one page, so an empty document still renders.
pub fn paginate<T: Clone>(lines: &[T], lines_per_page: usize) -> Vec<Vec<T>> {
    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines
        .chunks(lines_per_page.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
