//! Instruction token definitions
//!
//! This module defines the tokens the instruction lexer produces. Only the
//! vocabulary of the statement shapes the store understands is keyworded;
//! everything else lexes as an identifier.

use std::fmt;

/// Instruction token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // ========== Keywords ==========
    // Statement Keywords
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Into,
    Values,
    Set,
    From,
    Where,

    // Conflict Handling
    Replace,
    Ignore,

    // Clauses
    And,
    Or,
    Not,
    As,
    Is,
    In,
    Like,
    Join,

    // Ordering
    Order,
    By,
    Asc,
    Desc,
    Limit,
    Offset,

    // Aggregates
    Count,

    // Literals
    Null,
    True,
    False,

    // ========== Literals ==========
    /// Integer literal
    IntegerLiteral(i64),
    /// Float literal
    FloatLiteral(f64),
    /// String literal (single-quoted)
    StringLiteral(String),
    /// Identifier (entity name, field name, etc.)
    Identifier(String),
    /// Positional parameter `?`
    Placeholder,

    // ========== Operators ==========
    /// =
    Eq,
    /// <> or !=
    Neq,
    /// <
    Lt,
    /// >
    Gt,
    /// <=
    Lte,
    /// >=
    Gte,
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Asterisk,

    // ========== Delimiters ==========
    /// (
    LParen,
    /// )
    RParen,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// .
    Dot,

    // ========== Special ==========
    /// End of input
    Eof,
}

impl Token {
    /// Try to parse a keyword from a string (case-insensitive)
    pub fn from_keyword(s: &str) -> Option<Token> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Token::Select),
            "INSERT" => Some(Token::Insert),
            "UPDATE" => Some(Token::Update),
            "DELETE" => Some(Token::Delete),
            "CREATE" => Some(Token::Create),
            "INTO" => Some(Token::Into),
            "VALUES" => Some(Token::Values),
            "SET" => Some(Token::Set),
            "FROM" => Some(Token::From),
            "WHERE" => Some(Token::Where),

            "REPLACE" => Some(Token::Replace),
            "IGNORE" => Some(Token::Ignore),

            "AND" => Some(Token::And),
            "OR" => Some(Token::Or),
            "NOT" => Some(Token::Not),
            "AS" => Some(Token::As),
            "IS" => Some(Token::Is),
            "IN" => Some(Token::In),
            "LIKE" => Some(Token::Like),
            "JOIN" => Some(Token::Join),

            "ORDER" => Some(Token::Order),
            "BY" => Some(Token::By),
            "ASC" => Some(Token::Asc),
            "DESC" => Some(Token::Desc),
            "LIMIT" => Some(Token::Limit),
            "OFFSET" => Some(Token::Offset),

            "COUNT" => Some(Token::Count),

            "NULL" => Some(Token::Null),
            "TRUE" => Some(Token::True),
            "FALSE" => Some(Token::False),

            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::IntegerLiteral(n) => write!(f, "{}", n),
            Token::FloatLiteral(n) => write!(f, "{}", n),
            Token::StringLiteral(s) => write!(f, "'{}'", s),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Placeholder => write!(f, "?"),
            Token::Eq => write!(f, "="),
            Token::Neq => write!(f, "<>"),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Lte => write!(f, "<="),
            Token::Gte => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Asterisk => write!(f, "*"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Dot => write!(f, "."),
            Token::Eof => write!(f, "end of input"),
            keyword => write!(f, "{}", format!("{:?}", keyword).to_uppercase()),
        }
    }
}
