pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Recognise an opening `$tag$` (or `$$`) at `start`.
///
/// Returns the tag and the index of the closing `$` of the opening delimiter.
/// Tags follow identifier rules, so `$1` never opens a quoted block.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }
    if idx < bytes.len() {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

/// True when the `$` at `idx` starts the closing `$tag$` delimiter.
pub(super) fn closes_dollar_quote(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let tag_end = idx + 1 + tag.len();
    bytes.get(idx) == Some(&b'$')
        && bytes.get(idx + 1..tag_end) == Some(tag.as_bytes())
        && bytes.get(tag_end) == Some(&b'$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_quote_tags() {
        assert_eq!(try_start_dollar_quote(b"$$ body $$", 0), Some((String::new(), 1)));
        assert_eq!(try_start_dollar_quote(b"$fn$ x $fn$", 0), Some(("fn".into(), 3)));
        assert_eq!(try_start_dollar_quote(b"$1, $2", 0), None);
        assert_eq!(try_start_dollar_quote(b"$name)", 0), None);
    }

    #[test]
    fn closing_tag_must_match() {
        let sql = b"$fn$ x $fn$";
        assert!(closes_dollar_quote(sql, 7, "fn"));
        assert!(!closes_dollar_quote(sql, 7, "f"));
        assert!(!closes_dollar_quote(b"$f", 0, "fn"));
    }
}
