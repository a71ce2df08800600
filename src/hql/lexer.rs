//! Lexer for the query language.
//!
//! Keywords are not distinguished here: every word is a [`Token::Word`] and
//! the parser decides, case-insensitively, whether it is a keyword in the
//! position it appears. Most keywords may also be used as identifiers.

use chumsky::prelude::*;

use super::span::Span;

/// A token of query text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // ========================================================================
    // Words and Literals
    // ========================================================================
    /// A keyword or identifier.
    Word(&'src str),
    /// A backquoted identifier (contents without quotes).
    QuotedIdent(&'src str),
    /// A string literal, with doubled quotes already collapsed.
    Str(String),
    /// A numeric literal as written, including any type suffix.
    Number(&'src str),
    /// `:name`
    NamedParam(&'src str),
    /// `?` or `?1`
    PositionalParam(Option<&'src str>),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `*`
    Star,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `||`
    Concat,
    /// `=`
    Eq,
    /// `<>`, `!=` or `^=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

impl<'src> Token<'src> {
    /// Whether this token is the given keyword (case-insensitive).
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(s) => write!(f, "{}", s),
            Token::QuotedIdent(s) => write!(f, "`{}`", s),
            Token::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Token::Number(s) => write!(f, "{}", s),
            Token::NamedParam(s) => write!(f, ":{}", s),
            Token::PositionalParam(Some(s)) => write!(f, "?{}", s),
            Token::PositionalParam(None) => write!(f, "?"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Star => write!(f, "*"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Concat => write!(f, "||"),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::Lte => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Gte => write!(f, ">="),
        }
    }
}

/// A lexing failure: where it happened and what was found there.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub found: Option<char>,
}

/// Create the lexer parser.
///
/// Returns a parser that tokenizes the input string into a sequence of
/// tokens with span information, skipping whitespace.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let word = text::ident().map(Token::Word);

    let quoted_ident = just('`')
        .ignore_then(none_of('`').repeated().to_slice())
        .then_ignore(just('`'))
        .map(Token::QuotedIdent);

    // String literals: '...' with '' as an escaped quote
    let string_lit = just('\'')
        .ignore_then(
            choice((just("''").to('\''), none_of('\'')))
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('\''))
        .map(Token::Str);

    // Numbers: digits, optional fraction and exponent, optional type suffix
    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10));
    let suffix = choice((
        just("BD"),
        just("bd"),
        just("BI"),
        just("bi"),
        just("L"),
        just("l"),
        just("D"),
        just("d"),
        just("F"),
        just("f"),
    ));
    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .then(exponent.or_not())
        .then(suffix.or_not())
        .to_slice()
        .map(Token::Number);

    let named_param = just(':')
        .ignore_then(text::ident())
        .map(Token::NamedParam);

    let positional_param = just('?')
        .ignore_then(text::digits(10).to_slice().or_not())
        .map(Token::PositionalParam);

    // Symbols (multi-char first, then single-char)
    let symbol = choice((
        just("||").to(Token::Concat),
        just("<>").to(Token::Ne),
        just("!=").to(Token::Ne),
        just("^=").to(Token::Ne),
        just("<=").to(Token::Lte),
        just(">=").to(Token::Gte),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('=').to(Token::Eq),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
        just('*').to(Token::Star),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('/').to(Token::Slash),
        just('%').to(Token::Percent),
    ));

    let token = choice((
        word,
        quoted_ident,
        string_lit,
        number,
        named_param,
        positional_param,
        symbol,
    ))
    .map_with(|tok, e| (tok, e.span()));

    token
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

/// Lex query text into tokens.
///
/// Returns the first error on failure; lexing is never retried.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, Span)>, LexError> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if let Some(err) = errs.into_iter().next() {
        let span = err.span();
        return Err(LexError {
            span: span.start..span.end,
            found: err.found().copied(),
        });
    }
    Ok(tokens
        .unwrap_or_default()
        .into_iter()
        .map(|(tok, span)| (tok, span.start..span.end))
        .collect())
}
