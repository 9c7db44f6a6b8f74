//! Chunking long messages for the Telegram 4096-character limit.
//!
//! Splits fall on newline boundaries whenever the current window contains
//! one, so formatting entities that stay within a single line (the node
//! listing's bold names and inline code) remain balanced per chunk. A single
//! line longer than the limit is hard-split at a character boundary.
//! Concatenating the chunks reproduces the input exactly.

/// Telegram Bot API message length limit, in characters.
pub const TELEGRAM_MAX_MESSAGE: usize = 4096;

/// Split `text` into ordered chunks of at most `max_chars` characters.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    assert!(max_chars > 0, "chunk limit must be positive");
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            // Oversized single line: fall back to per-character slicing.
            let mut buf = String::new();
            let mut buf_len = 0usize;
            for ch in line.chars() {
                if buf_len == max_chars {
                    chunks.push(std::mem::take(&mut buf));
                    buf_len = 0;
                }
                buf.push(ch);
                buf_len += 1;
            }
            current = buf;
            current_len = buf_len;
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
    }

    #[test]
    fn splits_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc\n";
        let chunks = split_message(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cccc\n"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn oversized_line_hard_splits() {
        let text = "x".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn multibyte_chars_are_counted_not_sliced() {
        let text = "🐱🐱🐱🐱🐱";
        let chunks = split_message(text, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), text);
    }
}
