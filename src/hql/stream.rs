//! Token cursor used by the parser.
//!
//! The cursor owns the lexed tokens and a position. Lookahead is unbounded
//! but the parser only uses a few tokens except when speculating, which it
//! does through [`TokenCursor::mark`] and [`TokenCursor::reset`].

use super::lexer::Token;
use super::span::Span;

/// Text used for the end of input in messages.
pub const EOF_TEXT: &str = "<EOF>";

pub struct TokenCursor<'src> {
    source: &'src str,
    tokens: Vec<(Token<'src>, Span)>,
    position: usize,
}

impl<'src> TokenCursor<'src> {
    pub fn new(source: &'src str, tokens: Vec<(Token<'src>, Span)>) -> Self {
        Self {
            source,
            tokens,
            position: 0,
        }
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    // ========================================================================
    // Lookahead
    // ========================================================================

    pub fn peek(&self) -> Option<&Token<'src>> {
        self.peek_nth(0)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token<'src>> {
        self.tokens.get(self.position + n).map(|(tok, _)| tok)
    }

    pub fn check(&self, token: &Token<'_>) -> bool {
        self.check_nth(0, token)
    }

    pub fn check_nth(&self, n: usize, token: &Token<'_>) -> bool {
        self.peek_nth(n).is_some_and(|t| t == token)
    }

    pub fn check_keyword(&self, keyword: &str) -> bool {
        self.check_keyword_nth(0, keyword)
    }

    pub fn check_keyword_nth(&self, n: usize, keyword: &str) -> bool {
        self.peek_nth(n).is_some_and(|t| t.is_keyword(keyword))
    }

    pub fn at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    // ========================================================================
    // Consumption
    // ========================================================================

    pub fn advance(&mut self) -> Option<(Token<'src>, Span)> {
        let next = self.tokens.get(self.position).cloned();
        if next.is_some() {
            self.position += 1;
        }
        next
    }

    /// Consume the current token if it equals `token`.
    pub fn eat(&mut self, token: &Token<'_>) -> bool {
        if self.check(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consume the current token if it is `keyword`.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    pub fn mark(&self) -> usize {
        self.position
    }

    pub fn reset(&mut self, mark: usize) -> Result<(), String> {
        if mark > self.tokens.len() {
            return Err(format!(
                "cannot reset token cursor to {mark}: only {} tokens",
                self.tokens.len()
            ));
        }
        self.position = mark;
        Ok(())
    }

    // ========================================================================
    // Positions
    // ========================================================================

    /// Span of the current token, or an empty span at the end of input.
    pub fn span(&self) -> Span {
        match self.tokens.get(self.position) {
            Some((_, span)) => span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    /// Span of the most recently consumed token.
    pub fn previous_span(&self) -> Span {
        match self.position.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some((_, span)) => span.clone(),
            None => 0..0,
        }
    }

    /// Source text of the current token, `<EOF>` at the end.
    pub fn text(&self) -> String {
        match self.tokens.get(self.position) {
            Some((_, span)) => self.source[span.clone()].to_string(),
            None => EOF_TEXT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hql::lexer::lex;

    #[test]
    fn test_cursor_lookahead_and_reset() {
        let source = "select p from Person p";
        let mut cursor = TokenCursor::new(source, lex(source).unwrap());

        assert!(cursor.check_keyword("SELECT"));
        assert!(cursor.check_keyword_nth(2, "from"));

        let mark = cursor.mark();
        assert!(cursor.eat_keyword("select"));
        assert_eq!(cursor.text(), "p");
        cursor.reset(mark).unwrap();
        assert_eq!(cursor.text(), "select");

        assert!(cursor.reset(100).is_err());
    }

    #[test]
    fn test_cursor_end_of_input() {
        let source = "from X";
        let mut cursor = TokenCursor::new(source, lex(source).unwrap());
        cursor.advance();
        cursor.advance();

        assert!(cursor.at_end());
        assert_eq!(cursor.text(), "<EOF>");
        assert_eq!(cursor.span(), 6..6);
        assert_eq!(cursor.previous_span(), 5..6);
        assert!(cursor.advance().is_none());
    }
}
