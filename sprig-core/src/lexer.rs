//! Lexer for Sprig.
//!
//! Structural characters `( ) { } ;` and the operators
//! `+ - * / < > == !=` always stand on their own, whether or not the
//! source surrounds them with whitespace. A bare `=` is the assignment
//! token; it never swallows a neighbouring `=` that belongs to `==` or
//! `!=`. Everything else is grouped into whitespace-delimited fragments:
//! keywords become structural tokens, and any other fragment becomes a
//! `Data` token carrying its text verbatim. Whether that text is a valid
//! name or numeral is decided by whoever consumes it.

use crate::error::CoreError;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Let,
    If,
    Else,
    While,

    // Punctuation
    Assign, // =
    Semi,   // ;
    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }

    /// Name, integer literal, or operator symbol.
    Data(String),
}

impl TokenKind {
    /// Human readable form used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Let => "'let'".to_string(),
            TokenKind::If => "'if'".to_string(),
            TokenKind::Else => "'else'".to_string(),
            TokenKind::While => "'while'".to_string(),
            TokenKind::Assign => "'='".to_string(),
            TokenKind::Semi => "';'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Data(text) => format!("'{text}'"),
        }
    }
}

/// A single token with its kind and byte offsets into the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Lex a source string into tokens.
pub fn lex(source: &str) -> Result<Vec<Token>, CoreError> {
    let mut lexer = Lexer {
        source,
        chars: source.as_bytes(),
        index: 0,
        fragment_start: None,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    index: usize,
    /// Start of the fragment currently being accumulated, if any.
    fragment_start: Option<usize>,
    tokens: Vec<Token>,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<(), CoreError> {
        while let Some(ch) = self.peek_char() {
            let start = self.index;
            match ch {
                b'(' => self.single(TokenKind::LParen)?,
                b')' => self.single(TokenKind::RParen)?,
                b'{' => self.single(TokenKind::LBrace)?,
                b'}' => self.single(TokenKind::RBrace)?,
                b';' => self.single(TokenKind::Semi)?,
                b'+' | b'-' | b'*' | b'/' | b'<' | b'>' => {
                    self.flush_fragment()?;
                    self.consume_char();
                    self.push_operator(start)?;
                }
                b'=' => {
                    self.flush_fragment()?;
                    self.consume_char();
                    if self.peek_char() == Some(b'=') {
                        self.consume_char();
                        self.push_operator(start)?;
                    } else {
                        self.push(TokenKind::Assign, start);
                    }
                }
                // `!=`; any other `!` is ordinary fragment text.
                b'!' if self.chars.get(self.index + 1) == Some(&b'=') => {
                    self.flush_fragment()?;
                    self.consume_char();
                    self.consume_char();
                    self.push_operator(start)?;
                }
                _ if is_whitespace(ch) => {
                    self.flush_fragment()?;
                    self.consume_char();
                }
                _ => {
                    if self.fragment_start.is_none() {
                        self.fragment_start = Some(start);
                    }
                    self.consume_char();
                }
            }
        }
        self.flush_fragment()
    }

    fn single(&mut self, kind: TokenKind) -> Result<(), CoreError> {
        self.flush_fragment()?;
        let start = self.index;
        self.consume_char();
        self.push(kind, start);
        Ok(())
    }

    fn push_operator(&mut self, start: usize) -> Result<(), CoreError> {
        let text = self.text(start)?.to_string();
        self.push(TokenKind::Data(text), start);
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            start,
            end: self.index,
        });
    }

    /// Close the pending fragment and classify it.
    fn flush_fragment(&mut self) -> Result<(), CoreError> {
        let Some(start) = self.fragment_start.take() else {
            return Ok(());
        };
        let kind = match self.text(start)? {
            "let" => TokenKind::Let,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            text => TokenKind::Data(text.to_string()),
        };
        self.push(kind, start);
        Ok(())
    }

    /// Source text from `start` up to the scan position. Tokens only
    /// split at ASCII bytes, so both ends sit on character boundaries.
    fn text(&self, start: usize) -> Result<&'src str, CoreError> {
        self.source
            .get(start..self.index)
            .ok_or_else(|| CoreError::LexError {
                position: start,
                message: "token does not end on a character boundary".to_string(),
            })
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.chars.len() {
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}
