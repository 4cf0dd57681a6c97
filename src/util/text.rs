//! Bounded text copy for fixed-capacity names.

/// Copy `name`, keeping at most `max_len` bytes and truncating on a
/// character boundary.
pub(crate) fn bounded_name(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_owned();
    }
    let mut end = max_len;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_kept() {
        assert_eq!(bounded_name("renderer", 63), "renderer");
        assert_eq!(bounded_name("", 63), "");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        assert_eq!(bounded_name("abcdef", 4), "abcd");
        // Multi-byte character straddling the limit is dropped whole.
        assert_eq!(bounded_name("ab\u{00e9}cd", 3), "ab");
    }
}
