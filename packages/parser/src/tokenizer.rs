use logos::Logos;
use std::fmt;
use std::ops::Range;

use crate::error::{ParseError, ParseResult};

/// Token types for the expression language.
///
/// The token set is deliberately closed: numbers, identifiers, the four
/// arithmetic operators, grouping delimiters and the argument separator.
/// Any other character fails lexing, so an expression is rejected before
/// anything gets evaluated.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token<'src> {
    // Numbers
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    // Identifiers (property and function names)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    // Grouping. Square brackets are how collapsed sub-expressions render
    // inline, so the grammar treats them exactly like parentheses.
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
        }
    }
}

/// Tokenize an expression into `(token, byte span)` pairs.
///
/// Fails with `DisallowedToken` at the first character outside the
/// expression language.
pub fn tokenize(source: &str) -> ParseResult<Vec<(Token<'_>, Range<usize>)>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(ParseError::disallowed_token(lexer.span().start)),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_arithmetic() {
        let tokens = tokenize("a + 2.5 * (b - 1)").unwrap();
        let kinds: Vec<Token> = tokens.into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Ident("a"),
                Token::Plus,
                Token::Number(2.5),
                Token::Star,
                Token::LParen,
                Token::Ident("b"),
                Token::Minus,
                Token::Number(1.0),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_brackets_and_commas() {
        let tokens = tokenize("Sum(a, [b / 2])").unwrap();
        assert_eq!(tokens.len(), 10);
        assert_eq!(tokens[0].0, Token::Ident("Sum"));
        assert_eq!(tokens[3].0, Token::Comma);
        assert_eq!(tokens[4].0, Token::LBracket);
    }

    #[test]
    fn test_tokenize_spans_are_byte_offsets() {
        let tokens = tokenize("ab + 1").unwrap();
        assert_eq!(tokens[0].1, 0..2);
        assert_eq!(tokens[1].1, 3..4);
        assert_eq!(tokens[2].1, 5..6);
    }

    #[test]
    fn test_disallowed_characters_rejected() {
        for source in ["a = 1", "a; b", "\"str\"", "a { b }", "a.b", "x % 2"] {
            let err = tokenize(source).unwrap_err();
            assert!(
                matches!(err, ParseError::DisallowedToken { .. }),
                "{} should be rejected, got {:?}",
                source,
                err
            );
        }
    }
}
