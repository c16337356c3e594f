use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unexpected character '{character}' at line {line}, column {column}")]
    UnexpectedCharacter {
        character: char,
        line: usize,
        column: usize,
    },
    #[error("Invalid int literal '{literal}' at line {line}, column {column}")]
    InvalidIntLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
    #[error("Invalid float literal '{literal}' at line {line}, column {column}")]
    InvalidFloatLiteral {
        literal: String,
        line: usize,
        column: usize,
    },
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        loop {
            let Some(&(start, ch)) = self.chars.peek() else {
                let end = self.input.len();
                return Ok(Token::new(
                    TokenKind::EOF,
                    Span {
                        start: end,
                        end,
                        line: self.line,
                        column: self.column,
                    },
                ));
            };
            let line = self.line;
            let column = self.column;

            match ch {
                ' ' | '\t' => {
                    self.advance_char();
                }
                '#' => self.skip_comment(),
                '\n' => {
                    self.advance_char();
                    return Ok(Token::new(
                        TokenKind::Newline,
                        Span {
                            start,
                            end: start + 1,
                            line,
                            column,
                        },
                    ));
                }
                '[' => return Ok(self.punct(TokenKind::LBracket)),
                ']' => return Ok(self.punct(TokenKind::RBracket)),
                '(' => return Ok(self.punct(TokenKind::LParen)),
                ')' => return Ok(self.punct(TokenKind::RParen)),
                ':' => return Ok(self.punct(TokenKind::Colon)),
                ',' => return Ok(self.punct(TokenKind::Comma)),
                ';' => return Ok(self.punct(TokenKind::Semicolon)),
                // `=` and the arithmetic/comparison characters all accept an
                // optional `=` suffix, so `==` `<=` `+=` lex as one operator.
                '=' | '+' | '-' | '*' | '/' | '%' | '<' | '>' => {
                    self.advance_char();
                    let end = if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.advance_char();
                        start + 2
                    } else {
                        start + 1
                    };
                    return Ok(Token::new(
                        TokenKind::Op(&self.input[start..end]),
                        Span {
                            start,
                            end,
                            line,
                            column,
                        },
                    ));
                }
                // `!` and `?` only exist as prefixes of `!=` and `?.`.
                '!' => {
                    self.advance_char();
                    if matches!(self.chars.peek(), Some(&(_, '='))) {
                        self.advance_char();
                        return Ok(Token::new(
                            TokenKind::Op(&self.input[start..start + 2]),
                            Span {
                                start,
                                end: start + 2,
                                line,
                                column,
                            },
                        ));
                    }
                    return Err(LexError::UnexpectedCharacter {
                        character: '!',
                        line,
                        column,
                    });
                }
                '?' => {
                    self.advance_char();
                    if matches!(self.chars.peek(), Some(&(_, '.'))) {
                        self.advance_char();
                        return Ok(Token::new(
                            TokenKind::Op(&self.input[start..start + 2]),
                            Span {
                                start,
                                end: start + 2,
                                line,
                                column,
                            },
                        ));
                    }
                    return Err(LexError::UnexpectedCharacter {
                        character: '?',
                        line,
                        column,
                    });
                }
                '"' => return self.read_string(start, line, column),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    return Ok(self.read_identifier(start, line, column));
                }
                c if c.is_ascii_digit() => return self.read_number(start, line, column),
                other => {
                    return Err(LexError::UnexpectedCharacter {
                        character: other,
                        line,
                        column,
                    });
                }
            }
        }
    }

    fn punct(&mut self, kind: TokenKind<'a>) -> Token<'a> {
        let start = self.current_index();
        let line = self.line;
        let column = self.column;
        self.advance_char();
        Token::new(
            kind,
            Span {
                start,
                end: start + 1,
                line,
                column,
            },
        )
    }

    fn skip_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }
        let end = self.current_index();
        Token::new(
            TokenKind::Ident(&self.input[start..end]),
            Span {
                start,
                end,
                line,
                column,
            },
        )
    }

    fn read_number(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> Result<Token<'a>, LexError> {
        self.advance_char();
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
            self.advance_char();
        }

        // A fraction needs a digit after the dot; `1.` stays an int token
        // and the dot falls through to the mismatch path.
        let mut is_float = false;
        if matches!(self.chars.peek(), Some(&(_, '.'))) {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
                is_float = true;
                self.advance_char();
                while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
                    self.advance_char();
                }
            }
        }

        let end = self.current_index();
        let text = &self.input[start..end];
        let span = Span {
            start,
            end,
            line,
            column,
        };
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| LexError::InvalidFloatLiteral {
                    literal: text.to_string(),
                    line,
                    column,
                })?;
            Ok(Token::new(TokenKind::Float(value), span))
        } else {
            let value = text.parse::<i64>().map_err(|_| LexError::InvalidIntLiteral {
                literal: text.to_string(),
                line,
                column,
            })?;
            Ok(Token::new(TokenKind::Int(value), span))
        }
    }

    fn read_string(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> Result<Token<'a>, LexError> {
        self.advance_char();
        loop {
            match self.chars.peek() {
                Some(&(idx, '"')) => {
                    self.advance_char();
                    return Ok(Token::new(
                        TokenKind::Str(&self.input[start + 1..idx]),
                        Span {
                            start,
                            end: idx + 1,
                            line,
                            column,
                        },
                    ));
                }
                Some(&(_, '\\')) => {
                    self.advance_char();
                    if self.advance_char().is_none() {
                        // No closing quote: the opening quote is the
                        // character nothing recognizes.
                        return Err(LexError::UnexpectedCharacter {
                            character: '"',
                            line,
                            column,
                        });
                    }
                }
                Some(_) => {
                    self.advance_char();
                }
                None => {
                    return Err(LexError::UnexpectedCharacter {
                        character: '"',
                        line,
                        column,
                    });
                }
            }
        }
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}
