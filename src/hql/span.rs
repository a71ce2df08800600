//! Source spans and line/column lookup.

use std::ops::Range;

/// Byte range into the query text.
pub type Span = Range<usize>;

/// A value with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// 1-based line and 0-based character column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..floor_char_boundary(source, offset)];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count(),
        None => before.chars().count(),
    };
    (line, column)
}

/// The full text of the line containing `offset`, without its newline.
pub fn line_at(source: &str, offset: usize) -> &str {
    let offset = floor_char_boundary(source, offset.min(source.len()));
    let start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = source[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(source.len());
    source[start..end].trim_end_matches('\r')
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_single_line() {
        assert_eq!(line_col("select from", 7), (1, 7));
        assert_eq!(line_col("select from", 11), (1, 11));
    }

    #[test]
    fn test_line_col_multi_line() {
        let source = "select p\nfrom Person p\nwhere";
        assert_eq!(line_col(source, 9), (2, 0));
        assert_eq!(line_col(source, 23), (3, 0));
        assert_eq!(line_at(source, 14), "from Person p");
    }

    #[test]
    fn test_columns_count_characters() {
        let source = "select 'été' from";
        assert_eq!(line_col(source, source.len() - 4), (1, 13));
    }
}
