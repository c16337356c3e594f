use thiserror::Error;

use crate::ast::{AssignTarget, Expr, FuncDef, Program, Stmt};
use crate::infer::Ty;
use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Expected {expected}, got {found}")]
    Expected {
        expected: &'static str,
        found: String,
    },
    #[error("Unexpected token: {found}")]
    UnexpectedStatement { found: String },
    #[error("Unexpected token in expression: {found}")]
    UnexpectedExpression { found: String },
}

fn precedence(op: &str) -> i8 {
    match op {
        "*" | "/" | "%" => 3,
        "+" | "-" => 2,
        "==" | "!=" | ">" | "<" | ">=" | "<=" => 1,
        "=" => 0,
        _ => -1,
    }
}

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        while !matches!(self.kind(), TokenKind::EOF) {
            if matches!(self.kind(), TokenKind::Newline) {
                self.advance();
                continue;
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.kind() {
            TokenKind::Ident(kw) => match kw {
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "for" => self.parse_for(),
                "def" => self.parse_func(),
                "return" => self.parse_return(),
                _ => self.parse_assign_or_call(),
            },
            kind => Err(ParseError::UnexpectedStatement {
                found: kind_label(&kind),
            }),
        }
    }

    fn consume_stmt_end(&mut self) {
        if matches!(self.kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    /// Newline-skipped statements until end of input or an `else` at this
    /// level. There is no explicit block terminator.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        if matches!(self.kind(), TokenKind::Newline) {
            self.advance();
        }
        loop {
            match self.kind() {
                TokenKind::EOF => break,
                TokenKind::Newline => self.advance(),
                TokenKind::Ident("else") => break,
                _ => stmts.push(self.parse_stmt()?),
            }
        }
        Ok(stmts)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let cond = self.parse_expr()?;
        self.expect_colon()?;
        let body = self.parse_block()?;

        let mut orelse = None;
        if matches!(self.kind(), TokenKind::Ident("else")) {
            self.advance();
            self.expect_colon()?;
            orelse = Some(self.parse_block()?);
        }

        Ok(Stmt::If { cond, body, orelse })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let cond = self.parse_expr()?;
        self.expect_colon()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let var = self.expect_ident()?.to_string();
        self.expect_colon()?;
        self.expect_ident()?; // the `range` word
        self.expect_lparen()?;
        let start = self.parse_expr()?;
        self.expect_comma()?;
        let end = self.parse_expr()?;
        self.expect_rparen()?;
        self.expect_colon()?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            var,
            start,
            end,
            body,
        })
    }

    fn parse_func(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident()?.to_string();

        self.expect_lparen()?;
        let mut params = Vec::new();
        let mut param_types = Vec::new();
        while !matches!(self.kind(), TokenKind::RParen) {
            let pname = self.expect_ident()?.to_string();
            let mut ptype = Ty::Unknown;
            if matches!(self.kind(), TokenKind::Colon) {
                self.advance();
                ptype = Ty::from_name(self.expect_ident()?);
            }
            params.push(pname);
            param_types.push(ptype);
            if matches!(self.kind(), TokenKind::Comma) {
                self.advance();
            }
        }
        self.expect_rparen()?;

        let mut ret_type = Ty::Void;
        if matches!(self.kind(), TokenKind::Colon) {
            self.advance();
            ret_type = Ty::from_name(self.expect_ident()?);
        }

        self.expect_colon()?;
        let body = self.parse_block()?;

        Ok(Stmt::Func(FuncDef {
            name,
            params,
            param_types,
            ret_type,
            body,
        }))
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        self.advance();
        let expr = match self.kind() {
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::EOF => None,
            _ => Some(self.parse_expr()?),
        };
        self.consume_stmt_end();
        Ok(Stmt::Return(expr))
    }

    fn parse_assign_or_call(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect_ident()?.to_string();

        if matches!(self.kind(), TokenKind::LBracket) {
            self.advance();
            let index = self.parse_expr()?;
            self.expect_rbracket()?;
            self.expect_op()?;
            let value = self.parse_expr()?;
            self.consume_stmt_end();
            return Ok(Stmt::Assign {
                target: AssignTarget::Element { array: name, index },
                value,
            });
        }

        if matches!(self.kind(), TokenKind::Op("=")) {
            self.advance();
            let value = self.parse_expr()?;
            self.consume_stmt_end();
            return Ok(Stmt::Assign {
                target: AssignTarget::Name(name),
                value,
            });
        }

        let mut args = Vec::new();
        if matches!(self.kind(), TokenKind::LParen) {
            self.advance();
            while !matches!(self.kind(), TokenKind::RParen) {
                args.push(self.parse_expr()?);
                if matches!(self.kind(), TokenKind::Comma) {
                    self.advance();
                }
            }
            self.expect_rparen()?;
        }
        self.consume_stmt_end();
        Ok(Stmt::Expr(Expr::Call { name, args }))
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_binop(0)
    }

    /// Precedence climbing; the `prec + 1` in the recursion keeps each
    /// level left-associative.
    fn parse_binop(&mut self, min_prec: i8) -> Result<Expr, ParseError> {
        let mut left = self.parse_primary()?;
        while let TokenKind::Op(op) = self.kind() {
            let prec = precedence(op);
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binop(prec + 1)?;
            left = Expr::Binary {
                left: Box::new(left),
                op: op.to_string(),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.kind() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::Int(value))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expr::Float(value))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str(value.to_string()))
            }
            TokenKind::Ident(name) => {
                self.advance();

                if matches!(self.kind(), TokenKind::Op("?.")) {
                    self.advance();
                    let field = self.expect_ident()?.to_string();
                    return Ok(Expr::SafeNav {
                        object: Box::new(Expr::Var(name.to_string())),
                        field,
                    });
                }

                if matches!(self.kind(), TokenKind::LBracket) {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect_rbracket()?;
                    return Ok(Expr::Index {
                        array: name.to_string(),
                        index: Box::new(index),
                    });
                }

                if matches!(self.kind(), TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    while !matches!(self.kind(), TokenKind::RParen) {
                        args.push(self.parse_expr()?);
                        if matches!(self.kind(), TokenKind::Comma) {
                            self.advance();
                        }
                    }
                    self.expect_rparen()?;
                    return Ok(Expr::Call {
                        name: name.to_string(),
                        args,
                    });
                }

                Ok(Expr::Var(name.to_string()))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            kind => Err(ParseError::UnexpectedExpression {
                found: kind_label(&kind),
            }),
        }
    }

    fn kind(&self) -> TokenKind<'a> {
        self.tokens
            .get(self.pos)
            .map(|token| token.kind)
            .unwrap_or(TokenKind::EOF)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn expect_ident(&mut self) -> Result<&'a str, ParseError> {
        if let TokenKind::Ident(name) = self.kind() {
            self.advance();
            Ok(name)
        } else {
            Err(self.expected("identifier"))
        }
    }

    fn expect_op(&mut self) -> Result<&'a str, ParseError> {
        if let TokenKind::Op(op) = self.kind() {
            self.advance();
            Ok(op)
        } else {
            Err(self.expected("operator"))
        }
    }

    fn expect_colon(&mut self) -> Result<(), ParseError> {
        if matches!(self.kind(), TokenKind::Colon) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected("':'"))
        }
    }

    fn expect_comma(&mut self) -> Result<(), ParseError> {
        if matches!(self.kind(), TokenKind::Comma) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected("','"))
        }
    }

    fn expect_lparen(&mut self) -> Result<(), ParseError> {
        if matches!(self.kind(), TokenKind::LParen) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected("'('"))
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        if matches!(self.kind(), TokenKind::RParen) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected("')'"))
        }
    }

    fn expect_rbracket(&mut self) -> Result<(), ParseError> {
        if matches!(self.kind(), TokenKind::RBracket) {
            self.advance();
            Ok(())
        } else {
            Err(self.expected("']'"))
        }
    }

    fn expected(&self, expected: &'static str) -> ParseError {
        ParseError::Expected {
            expected,
            found: kind_label(&self.kind()),
        }
    }
}

fn kind_label(kind: &TokenKind<'_>) -> String {
    format!("{kind:?}")
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse_program()
}
