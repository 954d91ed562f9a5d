use crate::ast::{BinaryOp, Expr, Span};
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, Token};
use std::ops::Range;

/// Recursive-descent parser for the expression language.
///
/// Grammar:
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := factor (('*' | '/') factor)*
/// factor  := '-' factor | primary
/// primary := NUMBER
///          | IDENT
///          | IDENT '(' args? ')'
///          | '(' expr ')'
///          | '[' expr ']'
/// args    := expr (',' expr)*
/// ```
///
/// Square brackets group exactly like parentheses; they are the inline
/// rendering of collapsed sub-expressions, so nesting flattens in one parse.
pub struct Parser<'src> {
    tokens: Vec<(Token<'src>, Range<usize>)>,
    pos: usize,
    source_len: usize,
}

/// Parse a complete expression
pub fn parse(source: &str) -> ParseResult<Expr> {
    Parser::new(source)?.parse_complete()
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let tokens = tokenize(source)?;
        Ok(Self {
            tokens,
            pos: 0,
            source_len: source.len(),
        })
    }

    /// Parse the entire token stream as a single expression
    pub fn parse_complete(&mut self) -> ParseResult<Expr> {
        if self.is_at_end() {
            return Err(ParseError::EmptyExpression);
        }

        let expr = self.parse_expression()?;

        if let Some((token, span)) = self.peek() {
            return Err(ParseError::unexpected_token(
                span.start,
                "end of expression",
                token.to_string(),
            ));
        }

        Ok(expr)
    }

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;

        loop {
            let operator = if self.match_token(&Token::Plus) {
                BinaryOp::Add
            } else if self.match_token(&Token::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };

            let right = self.parse_term()?;
            let span = Span::new(left.span().start, right.span().end);
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_factor()?;

        loop {
            let operator = if self.match_token(&Token::Star) {
                BinaryOp::Multiply
            } else if self.match_token(&Token::Slash) {
                BinaryOp::Divide
            } else {
                break;
            };

            let right = self.parse_factor()?;
            let span = Span::new(left.span().start, right.span().end);
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        if let Some((Token::Minus, span)) = self.peek() {
            let start = span.start;
            self.pos += 1;
            let operand = self.parse_factor()?;
            let span = Span::new(start, operand.span().end);
            return Ok(Expr::Negate {
                operand: Box::new(operand),
                span,
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let (token, span) = match self.peek() {
            Some((token, span)) => (token.clone(), span.clone()),
            None => return Err(ParseError::unexpected_eof(self.source_len)),
        };

        match token {
            Token::Number(value) => {
                self.pos += 1;
                Ok(Expr::Number {
                    value,
                    span: Span::new(span.start, span.end),
                })
            }

            Token::Ident(name) => {
                self.pos += 1;
                if self.match_token(&Token::LParen) {
                    let mut arguments = Vec::new();
                    if !self.check(&Token::RParen) {
                        arguments.push(self.parse_expression()?);
                        while self.match_token(&Token::Comma) {
                            arguments.push(self.parse_expression()?);
                        }
                    }
                    let close = self.expect(Token::RParen)?;
                    Ok(Expr::Call {
                        function: name.to_string(),
                        arguments,
                        span: Span::new(span.start, close.end),
                    })
                } else {
                    Ok(Expr::Variable {
                        name: name.to_string(),
                        span: Span::new(span.start, span.end),
                    })
                }
            }

            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }

            Token::LBracket => {
                self.pos += 1;
                let inner = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                Ok(inner)
            }

            other => Err(ParseError::unexpected_token(
                span.start,
                "number, identifier, '(' or '['",
                other.to_string(),
            )),
        }
    }

    fn peek(&self) -> Option<&(Token<'src>, Range<usize>)> {
        self.tokens.get(self.pos)
    }

    fn check(&self, token: &Token) -> bool {
        matches!(self.peek(), Some((found, _)) if found == token)
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> ParseResult<Range<usize>> {
        match self.peek() {
            Some((found, span)) if *found == token => {
                let span = span.clone();
                self.pos += 1;
                Ok(span)
            }
            Some((found, span)) => Err(ParseError::unexpected_token(
                span.start,
                token.to_string(),
                found.to_string(),
            )),
            None => Err(ParseError::unexpected_eof(self.source_len)),
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        let expr = parse("1 + 2 * 3").unwrap();
        match expr {
            Expr::Binary {
                operator, right, ..
            } => {
                assert_eq!(operator, BinaryOp::Add);
                assert!(matches!(
                    *right,
                    Expr::Binary {
                        operator: BinaryOp::Multiply,
                        ..
                    }
                ));
            }
            other => panic!("expected binary add, got {:?}", other),
        }
    }

    #[test]
    fn test_parens_override_precedence() {
        let expr = parse("(1 + 2) * 3").unwrap();
        match expr {
            Expr::Binary { operator, left, .. } => {
                assert_eq!(operator, BinaryOp::Multiply);
                assert!(matches!(
                    *left,
                    Expr::Binary {
                        operator: BinaryOp::Add,
                        ..
                    }
                ));
            }
            other => panic!("expected binary multiply, got {:?}", other),
        }
    }

    #[test]
    fn test_brackets_group_like_parens() {
        assert_eq!(parse("[1 + 2] * 3").unwrap(), parse("(1 + 2) * 3").unwrap());
    }

    #[test]
    fn test_nested_brackets_flatten() {
        let expr = parse("[a + [b * 2]] - 1");
        assert!(expr.is_ok());
    }

    #[test]
    fn test_call_with_arguments() {
        let expr = parse("Sum(a, b, 3)").unwrap();
        match expr {
            Expr::Call {
                function,
                arguments,
                ..
            } => {
                assert_eq!(function, "Sum");
                assert_eq!(arguments.len(), 3);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_call_without_arguments() {
        let expr = parse("Avg()").unwrap();
        assert!(matches!(expr, Expr::Call { ref arguments, .. } if arguments.is_empty()));
    }

    #[test]
    fn test_unary_negation() {
        let expr = parse("-a * 2").unwrap();
        assert!(matches!(
            expr,
            Expr::Binary {
                operator: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(parse(""), Err(ParseError::EmptyExpression));
        assert_eq!(parse("   "), Err(ParseError::EmptyExpression));
    }

    #[test]
    fn test_trailing_token_fails() {
        let err = parse("1 + 2 3").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { pos: 6, .. }));
    }

    #[test]
    fn test_unbalanced_paren_fails() {
        assert!(matches!(
            parse("(1 + 2"),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_mismatched_bracket_fails() {
        assert!(parse("[1 + 2)").is_err());
    }

    #[test]
    fn test_operator_without_operand_fails() {
        assert!(matches!(
            parse("1 +"),
            Err(ParseError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            parse("* 2"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }
}
