//! Placeholder discovery in caller-supplied SQL text.
//!
//! The session layer never validates SQL; it only needs to know how many
//! parameter slots a statement exposes and which slot a name refers to.

mod parsers;
mod scanner;

use parsers::{
    closes_dollar_quote, is_block_comment_end, is_block_comment_start, is_line_comment_start,
    try_start_dollar_quote,
};
use scanner::{Marker, State, scan_digits, scan_ident};

use crate::error::SqlSessionError;

/// Slot layout of one SQL text.
///
/// * `?` opens a new anonymous slot on every occurrence.
/// * `?N` / `$N` address slot `N - 1`; repeating a number reuses the slot.
/// * `:name`, `@name` and `$name` get one slot per distinct name, in order of
///   first appearance.
///
/// Text inside quotes, comments and `$tag$` blocks is ignored, as are `::`
/// casts.
///
/// ```rust
/// use sql_session::placeholders::PlaceholderMap;
///
/// let map = PlaceholderMap::parse("INSERT INTO t VALUES (:a, :b, :a)")?;
/// assert_eq!(map.slot_count(), 2);
/// assert_eq!(map.slot_of(":b"), Some(1));
/// # Ok::<(), sql_session::SqlSessionError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    slots: Vec<Option<String>>,
}

/// Highest accepted `?N`/`$N` number, `SQLite`'s default variable limit.
pub const MAX_NUMBERED: usize = 32_766;

impl PlaceholderMap {
    /// Scan `sql` and build its slot layout.
    ///
    /// # Errors
    /// Returns [`SqlSessionError::PlaceholderError`] when numbered markers are
    /// mixed with anonymous or named ones, or when a marker is numbered `0` or
    /// above [`MAX_NUMBERED`].
    pub fn parse(sql: &str) -> Result<Self, SqlSessionError> {
        let mut map = PlaceholderMap::default();
        let mut numbered = false;
        let mut unnumbered = false;

        for marker in scan_markers(sql) {
            match marker {
                Marker::Anonymous => {
                    unnumbered = true;
                    map.slots.push(None);
                }
                Marker::Named(name) => {
                    unnumbered = true;
                    if !map.slots.iter().any(|slot| slot.as_deref() == Some(&name)) {
                        map.slots.push(Some(name));
                    }
                }
                Marker::Numbered(0) => {
                    return Err(SqlSessionError::PlaceholderError(
                        "placeholder numbers start at 1".into(),
                    ));
                }
                Marker::Numbered(n) if n > MAX_NUMBERED => {
                    return Err(SqlSessionError::PlaceholderError(format!(
                        "placeholder number exceeds {MAX_NUMBERED}"
                    )));
                }
                Marker::Numbered(n) => {
                    numbered = true;
                    if map.slots.len() < n {
                        map.slots.resize(n, None);
                    }
                }
            }
            if numbered && unnumbered {
                return Err(SqlSessionError::PlaceholderError(
                    "numbered placeholders cannot be mixed with `?` or named placeholders".into(),
                ));
            }
        }
        Ok(map)
    }

    /// Number of parameter slots the statement exposes.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot index of a named placeholder. The marker prefix is optional.
    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        let name = normalize_name(name);
        self.slots
            .iter()
            .position(|slot| slot.as_deref() == Some(name))
    }

    /// Name of each slot, `None` for anonymous or numbered slots.
    pub fn names(&self) -> impl Iterator<Item = Option<&str>> {
        self.slots.iter().map(Option::as_deref)
    }
}

/// Strip the `:`, `@` or `$` marker prefix from a placeholder name.
#[must_use]
pub fn normalize_name(name: &str) -> &str {
    name.strip_prefix([':', '@', '$']).unwrap_or(name)
}

fn scan_markers(sql: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut state = State::Normal;
    let bytes = sql.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'?' => {
                    if let Some((end, digits)) = scan_digits(bytes, idx + 1) {
                        markers.push(numbered(digits));
                        idx = end - 1;
                    } else {
                        markers.push(Marker::Anonymous);
                    }
                }
                b'$' => {
                    if let Some((end, digits)) = scan_digits(bytes, idx + 1) {
                        markers.push(numbered(digits));
                        idx = end - 1;
                    } else if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    } else if let Some((end, name)) = scan_ident(bytes, idx + 1) {
                        markers.push(Marker::Named(name.to_string()));
                        idx = end - 1;
                    }
                }
                b':' if bytes.get(idx + 1) == Some(&b':') => {
                    // `::type` cast
                    idx += 1;
                }
                b':' | b'@' => {
                    if let Some((end, name)) = scan_ident(bytes, idx + 1) {
                        markers.push(Marker::Named(name.to_string()));
                        idx = end - 1;
                    } else if b == b'@' && bytes.get(idx + 1) == Some(&b'@') {
                        // `@@global` system variable
                        idx += 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if closes_dollar_quote(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }
    markers
}

fn numbered(digits: &str) -> Marker {
    // Overflowing digits land above MAX_NUMBERED and are rejected by `parse`.
    Marker::Numbered(digits.parse().unwrap_or(usize::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(sql: &str) -> usize {
        PlaceholderMap::parse(sql).map(|m| m.slot_count()).unwrap_or(usize::MAX)
    }

    #[test]
    fn anonymous_markers_count_every_occurrence() {
        assert_eq!(count("INSERT INTO t VALUES (?, ?, ?)"), 3);
        assert_eq!(count("SELECT 1"), 0);
    }

    #[test]
    fn numbered_markers_share_slots() {
        assert_eq!(count("SELECT * FROM t WHERE a = $1 OR b = $1 OR c = $3"), 3);
        assert_eq!(count("SELECT * FROM t WHERE a = ?2"), 2);
    }

    #[test]
    fn named_markers_are_deduplicated_in_first_appearance_order() {
        let map = PlaceholderMap::parse("UPDATE p SET age = :age WHERE ln = @ln AND age <> :age")
            .expect("parse");
        assert_eq!(map.slot_count(), 2);
        assert_eq!(map.slot_of("age"), Some(0));
        assert_eq!(map.slot_of("@ln"), Some(1));
        assert_eq!(map.slot_of(":missing"), None);
    }

    #[test]
    fn skips_literals_comments_and_casts() {
        let sql = "SELECT '?', \"a?\", x::int -- :c ?\n/* ? /* :n */ ? */ FROM t WHERE a = ?";
        assert_eq!(count(sql), 1);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$body$ SELECT ?, :x $body$ WHERE a = $1";
        assert_eq!(count(sql), 1);
        assert_eq!(count("SELECT $$ ? $$, :y"), 1);
    }

    #[test]
    fn dollar_names_are_named_markers() {
        let map = PlaceholderMap::parse("SELECT * FROM t WHERE a = $first AND b = ?").expect("parse");
        assert_eq!(map.slot_count(), 2);
        assert_eq!(map.slot_of("$first"), Some(0));
    }

    #[test]
    fn mixing_numbered_and_anonymous_is_rejected() {
        let err = PlaceholderMap::parse("SELECT ?1, ?").unwrap_err();
        assert!(matches!(err, SqlSessionError::PlaceholderError(_)));
        let err = PlaceholderMap::parse("SELECT $0").unwrap_err();
        assert!(matches!(err, SqlSessionError::PlaceholderError(_)));
    }

    #[test]
    fn oversized_numbers_are_rejected() {
        for sql in [
            "SELECT * FROM t WHERE a = ?99999999999999999999999",
            "SELECT * FROM t WHERE a = $1000000000",
            "SELECT ?32767",
        ] {
            let err = PlaceholderMap::parse(sql).unwrap_err();
            assert!(matches!(err, SqlSessionError::PlaceholderError(_)), "{sql}");
        }
        assert_eq!(count("SELECT ?32766"), MAX_NUMBERED);
    }

    #[test]
    fn system_variables_are_not_placeholders() {
        assert_eq!(count("SELECT @@version, @x"), 1);
    }
}
