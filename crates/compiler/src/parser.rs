//! Recursive-descent parser for Mica.
//!
//! The grammar has four expression levels: `expression -> comparison ->
//! addition -> primary`. Each of `comparison` and `addition` accepts at
//! most one operator per invocation, so operators do not chain at the same
//! level; `a + b + c` is rejected by the surrounding context's token
//! expectations.
//!
//! `extern` and `export` are mutually exclusive by construction: the prefix
//! position consumes one keyword and never looks for the other.

use crate::ast::{BinaryOp, Expr, Function, Param, Program};
use crate::error::CompileError;
use crate::scanner::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// The token stream must end with an Eof token (the scanner guarantees
    /// this).
    pub fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(
            tokens.last().map(|t| t.kind),
            Some(TokenKind::Eof)
        ));
        Parser { tokens, pos: 0 }
    }

    /// Parse a whole translation unit: `program := function*`.
    pub fn parse(&mut self) -> Result<Program, CompileError> {
        let mut program = Program::new();
        while !self.check(TokenKind::Eof) {
            program.functions.push(self.parse_function()?);
        }
        Ok(program)
    }

    /// `function := [extern|export] 'fn' IDENT '(' params? ')'
    ///              ('->' type)? (';' | '{' stmt* '}')`
    fn parse_function(&mut self) -> Result<Function, CompileError> {
        let line = self.peek().line;

        let is_extern = self.eat(TokenKind::Extern);
        let is_export = if is_extern {
            false
        } else {
            self.eat(TokenKind::Export)
        };

        self.consume(TokenKind::Fn)?;
        let name = self.consume(TokenKind::Identifier)?.lexeme;

        self.consume(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen)?;

        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(CompileError::parse(
                    format!(
                        "duplicate parameter '{}' in function '{}'",
                        param.name, name
                    ),
                    line,
                ));
            }
        }

        let return_type = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        // extern functions are declarations: no body, just a semicolon
        let body = if is_extern {
            self.consume(TokenKind::Semicolon)?;
            Vec::new()
        } else {
            self.parse_block()?
        };

        Ok(Function {
            name,
            params,
            return_type,
            body,
            is_extern,
            is_export,
            line,
        })
    }

    /// `param := IDENT ':' type`
    fn parse_param(&mut self) -> Result<Param, CompileError> {
        let name = self.consume(TokenKind::Identifier)?.lexeme;
        self.consume(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Param { name, ty })
    }

    /// `type := '[' ']' type | TYPE`
    fn parse_type(&mut self) -> Result<String, CompileError> {
        if self.eat(TokenKind::LeftBracket) {
            self.consume(TokenKind::RightBracket)?;
            let inner = self.parse_type()?;
            return Ok(format!("[]{}", inner));
        }
        if self.check(TokenKind::Type) {
            return Ok(self.advance().lexeme);
        }
        let found = self.peek();
        Err(CompileError::parse(
            format!("unknown type syntax: found {}", describe_token(found)),
            found.line,
        ))
    }

    /// `'{' stmt* '}'`
    fn parse_block(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.consume(TokenKind::LeftBrace)?;
        let mut body = Vec::new();
        while !self.check(TokenKind::RightBrace) {
            if self.check(TokenKind::Eof) {
                let line = self.peek().line;
                return Err(CompileError::parse("unexpected end of input in block", line));
            }
            body.push(self.parse_statement()?);
        }
        self.consume(TokenKind::RightBrace)?;
        Ok(body)
    }

    /// The statement entry point. Statement-shaped forms consume their
    /// trailing semicolons; anything else falls through to a bare
    /// comparison expression (used only in nested contexts).
    fn parse_statement(&mut self) -> Result<Expr, CompileError> {
        match self.peek().kind {
            TokenKind::Return => {
                self.advance();
                let value = self.parse_expression()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(Expr::Return(Box::new(value)))
            }
            TokenKind::Const | TokenKind::Var => self.parse_var_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                self.advance();
                self.consume(TokenKind::Semicolon)?;
                Ok(Expr::Break)
            }
            TokenKind::Continue => {
                self.advance();
                self.consume(TokenKind::Semicolon)?;
                Ok(Expr::Continue)
            }
            TokenKind::Identifier if self.peek_next_kind() == TokenKind::LeftParen => {
                let call = self.parse_primary()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(call)
            }
            TokenKind::Identifier if self.peek_next_kind() == TokenKind::Equal => {
                let name = self.advance().lexeme;
                self.consume(TokenKind::Equal)?;
                let value = self.parse_expression()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                })
            }
            _ => self.parse_expression(),
        }
    }

    /// `(const|var) IDENT (':' type)? ('=' expr)? ';'`
    fn parse_var_decl(&mut self) -> Result<Expr, CompileError> {
        let is_const = self.advance().kind == TokenKind::Const;
        let name = self.consume(TokenKind::Identifier)?.lexeme;
        let ty = if self.eat(TokenKind::Colon) {
            self.parse_type()?
        } else {
            "u8".to_string()
        };
        let init = if self.eat(TokenKind::Equal) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.consume(TokenKind::Semicolon)?;
        Ok(Expr::VarDecl {
            name,
            ty,
            is_const,
            init,
        })
    }

    /// `if '(' expr ')' '{' stmt* '}' ('else' '{' stmt* '}')?`
    fn parse_if(&mut self) -> Result<Expr, CompileError> {
        self.advance();
        self.consume(TokenKind::LeftParen)?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen)?;
        let then_body = self.parse_block()?;
        let else_body = if self.eat(TokenKind::Else) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then_body,
            else_body,
        })
    }

    /// `while '(' expr ')' '{' stmt* '}'`
    fn parse_while(&mut self) -> Result<Expr, CompileError> {
        self.advance();
        self.consume(TokenKind::LeftParen)?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RightParen)?;
        let body = self.parse_block()?;
        Ok(Expr::While {
            cond: Box::new(cond),
            body,
        })
    }

    /// `for IDENT 'in' expr ':' expr '{' stmt* '}'`
    fn parse_for(&mut self) -> Result<Expr, CompileError> {
        self.advance();
        let var = self.consume(TokenKind::Identifier)?.lexeme;
        self.consume(TokenKind::In)?;
        let start = self.parse_expression()?;
        self.consume(TokenKind::Colon)?;
        let end = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Expr::For {
            var,
            start: Box::new(start),
            end: Box::new(end),
            body,
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        self.parse_comparison()
    }

    /// A single comparison operator between two additions.
    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_addition()?;
        let op = match self.peek().kind {
            TokenKind::EqualEqual => BinaryOp::Eq,
            TokenKind::BangEqual => BinaryOp::Ne,
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::LessEqual => BinaryOp::Le,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::GreaterEqual => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_addition()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// `addition := primary ('+' primary)?`
    fn parse_addition(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.parse_primary()?;
        if !self.eat(TokenKind::Plus) {
            return Ok(lhs);
        }
        let rhs = self.parse_primary()?;
        Ok(Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// `primary := NUMBER | TRUE | FALSE | STRING_LITERAL | '(' expr ')'
    ///           | IDENT ('(' args? ')')?`
    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.peek().kind {
            TokenKind::Number => {
                let token = self.advance();
                let value: i64 = token.lexeme.parse().map_err(|_| {
                    CompileError::parse(
                        format!("integer literal '{}' out of 64-bit range", token.lexeme),
                        token.line,
                    )
                })?;
                Ok(Expr::Number(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::StringLiteral => Ok(Expr::Str(self.advance().lexeme)),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::Identifier => {
                let name = self.advance().lexeme;
                if !self.eat(TokenKind::LeftParen) {
                    return Ok(Expr::Variable(name));
                }
                let mut args = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen)?;
                Ok(Expr::Call { callee: name, args })
            }
            _ => {
                let found = self.peek();
                Err(CompileError::parse(
                    format!("expected expression, found {}", describe_token(found)),
                    found.line,
                ))
            }
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_next_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if !self.check(TokenKind::Eof) {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    /// Require the next token to be `kind`; the first failed expectation
    /// aborts parsing with the expected kind and the position.
    fn consume(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        let found = self.peek();
        Err(CompileError::parse(
            format!(
                "expected {}, found {}",
                kind.describe(),
                describe_token(found)
            ),
            found.line,
        ))
    }
}

fn describe_token(token: &Token) -> String {
    if token.kind == TokenKind::Eof {
        "end of input".to_string()
    } else {
        format!("'{}'", token.lexeme)
    }
}
