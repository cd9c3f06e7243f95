#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// A placeholder marker found in normal SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Marker {
    /// `?`
    Anonymous,
    /// `?N` or `$N`, 1-based as written.
    Numbered(usize),
    /// `:name`, `@name` or `$name`
    Named(String),
}

/// Returns the end index (exclusive) and the digits starting at `start`.
pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

/// Returns the end index (exclusive) and the identifier starting at `start`.
pub(super) fn scan_ident(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    match bytes.get(start) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return None,
    }
    let mut idx = start + 1;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    std::str::from_utf8(&bytes[start..idx])
        .ok()
        .map(|ident| (idx, ident))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idents_stop_at_punctuation() {
        assert_eq!(scan_ident(b"name)", 0), Some((4, "name")));
        assert_eq!(scan_ident(b"_a1,", 0), Some((3, "_a1")));
        assert_eq!(scan_ident(b"1abc", 0), None);
    }

    #[test]
    fn digits_require_at_least_one() {
        assert_eq!(scan_digits(b"12,", 0), Some((2, "12")));
        assert_eq!(scan_digits(b"x", 0), None);
    }
}
