//! Instruction parser
//!
//! This module recognizes the narrow set of statement shapes the store
//! answers and turns them into templates. It is deliberately not a general
//! SQL parser: `OR`, joins, sub-selects, `LIKE`, `OFFSET` and friends are
//! rejected, and the caller treats a rejected instruction as a no-op.

use serde_json::{Number, Value};

use super::ast::*;
use super::lexer::Lexer;
use super::token::Token;
use crate::error::{Error, Result};
use crate::executor::query::OnConflict;

static EOF: Token = Token::Eof;

/// Alias a bare `COUNT(*)` is reported under
pub const DEFAULT_COUNT_ALIAS: &str = "count";

/// Instruction parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// Number of `?` parameters seen so far
    params: usize,
}

impl Parser {
    /// Create a new parser from an instruction string
    pub fn new(sql: &str) -> Result<Self> {
        let mut lexer = Lexer::new(sql);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
            params: 0,
        })
    }

    /// Parse a single instruction; trailing input is an error
    pub fn parse(&mut self) -> Result<Template> {
        let template = self.parse_statement()?;

        if self.check(&Token::Semicolon) {
            self.advance();
        }
        if !self.is_at_end() {
            return Err(Error::UnexpectedToken {
                expected: "end of instruction".to_string(),
                found: self.current().to_string(),
            });
        }

        Ok(template)
    }

    fn parse_statement(&mut self) -> Result<Template> {
        match self.current() {
            Token::Select => self.parse_select(),
            Token::Insert => self.parse_insert(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Create => self.parse_create(),
            _ => Err(Error::UnexpectedToken {
                expected: "SELECT, INSERT, UPDATE, DELETE or CREATE".to_string(),
                found: self.current().to_string(),
            }),
        }
    }

    // ========== SELECT Statement ==========

    fn parse_select(&mut self) -> Result<Template> {
        self.expect(&Token::Select)?;

        let count = if self.check(&Token::Count) {
            Some(self.parse_count()?)
        } else {
            self.skip_projection()?;
            None
        };

        self.expect(&Token::From)?;
        let table = self.expect_identifier()?;

        let conditions = if self.check(&Token::Where) {
            self.advance();
            self.parse_conditions()?
        } else {
            Vec::new()
        };

        let mut order_by = Vec::new();
        if self.check(&Token::Order) {
            self.advance();
            self.expect(&Token::By)?;
            order_by = self.parse_order_by_list()?;
        }

        let limit = if self.check(&Token::Limit) {
            self.advance();
            Some(self.parse_limit()?)
        } else {
            None
        };

        Ok(Template::Select {
            table,
            count,
            conditions,
            order_by,
            limit,
        })
    }

    /// `COUNT(*) [AS alias]`, returns the alias
    fn parse_count(&mut self) -> Result<String> {
        self.expect(&Token::Count)?;
        self.expect(&Token::LParen)?;
        if self.check(&Token::Asterisk) {
            self.advance();
        } else {
            self.expect_field()?;
        }
        self.expect(&Token::RParen)?;

        let alias = if self.check(&Token::As) {
            self.advance();
            if self.check(&Token::Count) {
                self.advance();
                DEFAULT_COUNT_ALIAS.to_string()
            } else {
                self.expect_identifier()?
            }
        } else if let Token::Identifier(name) = self.current().clone() {
            self.advance();
            name
        } else {
            DEFAULT_COUNT_ALIAS.to_string()
        };
        Ok(alias)
    }

    /// Projections never narrow the returned records; accept `*` or a
    /// plain column list and move on.
    fn skip_projection(&mut self) -> Result<()> {
        if self.check(&Token::Asterisk) {
            self.advance();
            return Ok(());
        }

        loop {
            self.expect_field()?;
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        Ok(())
    }

    fn parse_order_by_list(&mut self) -> Result<Vec<OrderItem>> {
        let mut items = Vec::new();

        loop {
            let field = self.expect_field()?;
            let ascending = if self.check(&Token::Desc) {
                self.advance();
                false
            } else {
                if self.check(&Token::Asc) {
                    self.advance();
                }
                true
            };

            items.push(OrderItem { field, ascending });

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        Ok(items)
    }

    fn parse_limit(&mut self) -> Result<LimitSlot> {
        match self.current().clone() {
            Token::Placeholder => {
                self.advance();
                self.params += 1;
                Ok(LimitSlot::LastParam)
            }
            Token::IntegerLiteral(n) if n >= 0 => {
                self.advance();
                Ok(LimitSlot::Literal(n as usize))
            }
            other => Err(Error::UnexpectedToken {
                expected: "? or a non-negative integer".to_string(),
                found: other.to_string(),
            }),
        }
    }

    // ========== INSERT Statement ==========

    fn parse_insert(&mut self) -> Result<Template> {
        self.expect(&Token::Insert)?;

        let on_conflict = if self.check(&Token::Or) {
            self.advance();
            match self.current().clone() {
                Token::Replace => {
                    self.advance();
                    OnConflict::Replace
                }
                Token::Ignore => {
                    self.advance();
                    OnConflict::Ignore
                }
                other => {
                    return Err(Error::UnexpectedToken {
                        expected: "REPLACE or IGNORE".to_string(),
                        found: other.to_string(),
                    })
                }
            }
        } else {
            OnConflict::Replace
        };

        self.expect(&Token::Into)?;
        let table = self.expect_identifier()?;

        self.expect(&Token::LParen)?;
        let columns = self.parse_identifier_list()?;
        self.expect(&Token::RParen)?;

        self.expect(&Token::Values)?;
        self.expect(&Token::LParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_slot()?);
            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(&Token::RParen)?;

        if columns.len() != values.len() {
            return Err(Error::ParseError(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }

        Ok(Template::Insert {
            table,
            on_conflict,
            columns,
            values,
        })
    }

    // ========== UPDATE Statement ==========

    fn parse_update(&mut self) -> Result<Template> {
        self.expect(&Token::Update)?;
        let table = self.expect_identifier()?;
        self.expect(&Token::Set)?;

        let mut assignments = Vec::new();
        loop {
            let field = self.expect_field()?;
            self.expect(&Token::Eq)?;
            let slot = self.parse_slot()?;
            assignments.push((field, slot));

            if !self.check(&Token::Comma) {
                break;
            }
            self.advance();
        }

        let conditions = if self.check(&Token::Where) {
            self.advance();
            self.parse_conditions()?
        } else {
            Vec::new()
        };

        Ok(Template::Update {
            table,
            assignments,
            conditions,
        })
    }

    // ========== DELETE Statement ==========

    fn parse_delete(&mut self) -> Result<Template> {
        self.expect(&Token::Delete)?;
        self.expect(&Token::From)?;
        let table = self.expect_identifier()?;

        let conditions = if self.check(&Token::Where) {
            self.advance();
            self.parse_conditions()?
        } else {
            Vec::new()
        };

        Ok(Template::Delete { table, conditions })
    }

    // ========== CREATE Statement ==========

    /// Schema declarations are acknowledged without being interpreted
    fn parse_create(&mut self) -> Result<Template> {
        self.expect(&Token::Create)?;
        while !self.is_at_end() && !self.check(&Token::Semicolon) {
            self.advance();
        }
        Ok(Template::Schema)
    }

    // ========== Conditions ==========

    fn parse_conditions(&mut self) -> Result<Vec<Condition>> {
        let mut conditions = Vec::new();

        loop {
            conditions.push(self.parse_condition()?);
            if !self.check(&Token::And) {
                break;
            }
            self.advance();
        }

        Ok(conditions)
    }

    fn parse_condition(&mut self) -> Result<Condition> {
        let field = self.expect_field()?;

        match self.current().clone() {
            Token::Eq => {
                self.advance();
                let slot = self.parse_slot()?;
                Ok(Condition {
                    field,
                    op: CompareOp::Eq,
                    slot,
                })
            }
            Token::Lt => {
                self.advance();
                let slot = self.parse_slot()?;
                Ok(Condition {
                    field,
                    op: CompareOp::Lt,
                    slot,
                })
            }
            Token::Is => {
                self.advance();
                self.expect(&Token::Null)?;
                Ok(Condition {
                    field,
                    op: CompareOp::Eq,
                    slot: Slot::Literal(Value::Null),
                })
            }
            other => Err(Error::UnexpectedToken {
                expected: "=, < or IS NULL".to_string(),
                found: other.to_string(),
            }),
        }
    }

    fn parse_slot(&mut self) -> Result<Slot> {
        let slot = match self.current().clone() {
            Token::Placeholder => {
                let index = self.params;
                self.params += 1;
                Slot::Param(index)
            }
            Token::IntegerLiteral(n) => Slot::Literal(Value::from(n)),
            Token::FloatLiteral(n) => Slot::Literal(
                Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| Error::ParseError(format!("non-finite number {}", n)))?,
            ),
            Token::StringLiteral(s) => Slot::Literal(Value::String(s)),
            Token::True => Slot::Literal(Value::Bool(true)),
            Token::False => Slot::Literal(Value::Bool(false)),
            Token::Null => Slot::Literal(Value::Null),
            other => {
                return Err(Error::UnexpectedToken {
                    expected: "? or a literal".to_string(),
                    found: other.to_string(),
                })
            }
        };
        self.advance();
        Ok(slot)
    }

    // ========== Helpers ==========

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_identifier()?];
        while self.check(&Token::Comma) {
            self.advance();
            names.push(self.expect_identifier()?);
        }
        Ok(names)
    }

    /// Field reference, optionally qualified (`stages.done` reads as `done`)
    fn expect_field(&mut self) -> Result<String> {
        let name = self.expect_identifier()?;
        if self.check(&Token::Dot) {
            self.advance();
            return self.expect_identifier();
        }
        Ok(name)
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&EOF)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    fn check(&self, token: &Token) -> bool {
        self.current() == token
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.check(token) {
            self.advance();
            Ok(())
        } else {
            Err(Error::UnexpectedToken {
                expected: token.to_string(),
                found: self.current().to_string(),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(Error::UnexpectedToken {
                expected: "identifier".to_string(),
                found: other.to_string(),
            }),
        }
    }
}

/// Parse an instruction into a template
pub fn parse(sql: &str) -> Result<Template> {
    Parser::new(sql)?.parse()
}
