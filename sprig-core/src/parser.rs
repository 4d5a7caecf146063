//! Recursive-descent parser for Sprig.
//!
//! ```text
//! program     = { statement }
//! statement   = declaration | assignment | if | while
//! declaration = "let" NAME "=" expr ";"
//! assignment  = NAME "=" expr ";"
//! if          = "if" "(" expr ")" "{" { statement } "}" [ "else" "{" { statement } "}" ]
//! while       = "while" "(" expr ")" "{" { statement } "}"
//! expr        = DATA { DATA }
//! ```
//!
//! There is no parse tree: every recognised construct is handed to the
//! [`BlockBuilder`] immediately, with one token of lookahead and no
//! backtracking. Nesting lives in the builder's level stack rather than
//! on the call stack, so the parser is a single loop over statements:
//! `if (..) {` and `while (..) {` open a level, `}` closes one, and a `}`
//! ending a then-branch may be followed by `else {`.

use crate::error::CoreError;
use crate::expr::is_name;
use crate::lexer::{Token, TokenKind};
use crate::scope::{BlockBuilder, Flow};

/// Parse a token stream into a populated builder.
pub fn parse(tokens: &[Token]) -> Result<BlockBuilder, CoreError> {
    let mut parser = Parser {
        tokens,
        position: 0,
        builder: BlockBuilder::new(),
    };
    parser.statements()?;
    Ok(parser.builder)
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    builder: BlockBuilder,
}

impl<'a> Parser<'a> {
    fn statements(&mut self) -> Result<(), CoreError> {
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Let => self.declaration()?,
                TokenKind::If => self.open_block(Flow::Condition)?,
                TokenKind::While => self.open_block(Flow::Loop)?,
                TokenKind::Data(_) => self.assignment()?,
                // A stray `}` is left to the builder, which reports it as
                // an unbalanced block.
                TokenKind::RBrace => self.close_block()?,
                TokenKind::Else => {
                    return Err(CoreError::UnbalancedBlock(
                        "'else' without a matching 'if'".to_string(),
                    ));
                }
                _ => {
                    let expected = if self.builder.is_balanced() {
                        "a statement"
                    } else {
                        "'}'"
                    };
                    return Err(unexpected(token, expected));
                }
            }
        }
        if !self.builder.is_balanced() {
            return Err(CoreError::UnbalancedBlock(
                "end of input before closing '}'".to_string(),
            ));
        }
        Ok(())
    }

    fn declaration(&mut self) -> Result<(), CoreError> {
        self.advance();
        let name = self.expect_name()?;
        self.expect(&TokenKind::Assign, "'='")?;
        let terms = self.expr()?;
        self.expect(&TokenKind::Semi, "';'")?;
        self.builder.declare(&name, &terms)
    }

    fn assignment(&mut self) -> Result<(), CoreError> {
        let name = self.expect_name()?;
        self.expect(&TokenKind::Assign, "'='")?;
        let terms = self.expr()?;
        self.expect(&TokenKind::Semi, "';'")?;
        self.builder.assign(&name, &terms)
    }

    /// `("if" | "while") "(" expr ")" "{"`
    fn open_block(&mut self, flow: Flow) -> Result<(), CoreError> {
        self.advance();
        let cond = self.condition()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        match flow {
            Flow::Condition => self.builder.enter_if(&cond),
            Flow::Loop => self.builder.enter_while(&cond),
        }
    }

    /// `"}" [ "else" "{" ]`; the else part only after a then-branch.
    fn close_block(&mut self) -> Result<(), CoreError> {
        self.advance();
        if self.builder.in_then_branch() && self.accept(&TokenKind::Else) {
            self.expect(&TokenKind::LBrace, "'{'")?;
            return self.builder.enter_else();
        }
        self.builder.close_block()
    }

    /// `"(" expr ")"`
    fn condition(&mut self) -> Result<Vec<&'a str>, CoreError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let terms = self.expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(terms)
    }

    /// Collect the data tokens of an expression; the first structural
    /// token ends it.
    fn expr(&mut self) -> Result<Vec<&'a str>, CoreError> {
        let mut terms = Vec::new();
        while let Some(Token {
            kind: TokenKind::Data(text),
            ..
        }) = self.peek()
        {
            terms.push(text.as_str());
            self.advance();
        }
        if terms.is_empty() {
            return Err(self.unexpected_here("an expression"));
        }
        Ok(terms)
    }

    fn expect_name(&mut self) -> Result<String, CoreError> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Data(text),
                ..
            }) if is_name(text) => {
                self.advance();
                Ok(text.clone())
            }
            _ => Err(self.unexpected_here("a variable name")),
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<(), CoreError> {
        if self.accept(kind) {
            Ok(())
        } else {
            Err(self.unexpected_here(expected))
        }
    }

    fn accept(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|token| &token.kind == kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn unexpected_here(&self, expected: &'static str) -> CoreError {
        match self.peek() {
            Some(token) => unexpected(token, expected),
            None => CoreError::UnexpectedToken {
                position: self.tokens.last().map_or(0, |token| token.end),
                expected,
                found: "end of input".to_string(),
            },
        }
    }
}

fn unexpected(token: &Token, expected: &'static str) -> CoreError {
    CoreError::UnexpectedToken {
        position: token.start,
        expected,
        found: token.kind.describe(),
    }
}
