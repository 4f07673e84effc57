//! Character-offset text splicing shared by text fields and contenteditable
//! content. Offsets are counted in `char`s and clamped to the text length.

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map_or(text.len(), |(byte, _)| byte)
}

/// Orders and clamps a `(start, end)` pair against `text`.
pub fn clamp_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let len = char_len(text);
    let (a, b) = if start <= end { (start, end) } else { (end, start) };
    (a.min(len), b.min(len))
}

/// Replaces `start..end` with `insert`; returns the new text and the caret
/// position right after the inserted text.
pub fn splice(text: &str, start: usize, end: usize, insert: &str) -> (String, usize) {
    let (start, end) = clamp_range(text, start, end);
    let (from, to) = (byte_offset(text, start), byte_offset(text, end));

    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..from]);
    out.push_str(insert);
    out.push_str(&text[to..]);

    (out, start + char_len(insert))
}

/// Backspace semantics: removes the selection if there is one, otherwise the
/// character before the caret. `None` when there is nothing to delete.
pub fn delete_backward(text: &str, start: usize, end: usize) -> Option<(String, usize)> {
    let (start, end) = clamp_range(text, start, end);
    if start != end {
        return Some(splice(text, start, end, ""));
    }
    if start == 0 {
        return None;
    }
    Some(splice(text, start - 1, start, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_inserts_at_caret() {
        assert_eq!(splice("Hllo", 1, 1, "e"), ("Hello".to_string(), 2));
    }

    #[test]
    fn splice_replaces_selection() {
        assert_eq!(splice("Hello world", 6, 11, "there"), ("Hello there".to_string(), 11));
    }

    #[test]
    fn splice_clamps_out_of_range_offsets() {
        assert_eq!(splice("ab", 10, 20, "c"), ("abc".to_string(), 3));
    }

    #[test]
    fn splice_orders_reversed_bounds() {
        assert_eq!(splice("abcd", 3, 1, "x"), ("axd".to_string(), 2));
    }

    #[test]
    fn splice_counts_chars_not_bytes() {
        assert_eq!(splice("héllo", 2, 2, "!"), ("hé!llo".to_string(), 3));
    }

    #[test]
    fn delete_backward_removes_previous_char() {
        assert_eq!(delete_backward("abc", 3, 3), Some(("ab".to_string(), 2)));
    }

    #[test]
    fn delete_backward_removes_selection() {
        assert_eq!(delete_backward("abcdef", 1, 4), Some(("aef".to_string(), 1)));
    }

    #[test]
    fn delete_backward_at_start_is_noop() {
        assert_eq!(delete_backward("abc", 0, 0), None);
    }
}
