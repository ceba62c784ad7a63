//! Instruction lexer (tokenizer)
//!
//! This module converts instruction strings into a stream of tokens.

use super::token::Token;
use crate::error::{Error, Result};

/// Instruction lexer
pub struct Lexer {
    /// Input characters
    input: Vec<char>,
    /// Current position in input
    position: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();

        if self.is_at_end() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();

        match ch {
            '(' => return Ok(self.single(Token::LParen)),
            ')' => return Ok(self.single(Token::RParen)),
            ',' => return Ok(self.single(Token::Comma)),
            ';' => return Ok(self.single(Token::Semicolon)),
            '.' => return Ok(self.single(Token::Dot)),
            '*' => return Ok(self.single(Token::Asterisk)),
            '+' => return Ok(self.single(Token::Plus)),
            '?' => return Ok(self.single(Token::Placeholder)),
            '=' => return Ok(self.single(Token::Eq)),
            '-' => {
                self.advance();
                // Negative number
                if !self.is_at_end() && self.current_char().is_ascii_digit() {
                    return match self.read_number()? {
                        Token::IntegerLiteral(n) => Ok(Token::IntegerLiteral(-n)),
                        Token::FloatLiteral(n) => Ok(Token::FloatLiteral(-n)),
                        other => Ok(other),
                    };
                }
                return Ok(Token::Minus);
            }
            '<' => {
                self.advance();
                return Ok(match self.peek_current() {
                    Some('=') => self.single(Token::Lte),
                    Some('>') => self.single(Token::Neq),
                    _ => Token::Lt,
                });
            }
            '>' => {
                self.advance();
                return Ok(match self.peek_current() {
                    Some('=') => self.single(Token::Gte),
                    _ => Token::Gt,
                });
            }
            '!' => {
                self.advance();
                if self.peek_current() == Some('=') {
                    return Ok(self.single(Token::Neq));
                }
                return Err(Error::UnexpectedCharacter('!', self.position));
            }
            '\'' => return self.read_quoted('\'').map(Token::StringLiteral),
            '"' | '`' => return self.read_quoted(ch).map(Token::Identifier),
            _ => {}
        }

        if ch.is_ascii_digit() {
            return self.read_number();
        }

        if ch.is_alphabetic() || ch == '_' {
            return Ok(self.read_identifier());
        }

        Err(Error::UnexpectedCharacter(ch, self.position))
    }

    /// Check if we've reached the end of input
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Get the current character
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek_current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek at the next character
    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Consume one character and yield `token`
    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// Skip whitespace and comments (`--` and `/* */`)
    fn skip_trivia(&mut self) {
        loop {
            while !self.is_at_end() && self.current_char().is_whitespace() {
                self.advance();
            }
            if self.is_at_end() {
                return;
            }

            match (self.current_char(), self.peek_char()) {
                ('-', Some('-')) => {
                    while !self.is_at_end() && self.current_char() != '\n' {
                        self.advance();
                    }
                }
                ('/', Some('*')) => {
                    self.position += 2;
                    while !self.is_at_end() {
                        if self.current_char() == '*' && self.peek_char() == Some('/') {
                            self.position += 2;
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// Read a quoted run; a doubled quote escapes itself
    fn read_quoted(&mut self, quote: char) -> Result<String> {
        let start_pos = self.position;
        self.advance(); // skip opening quote

        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();

            if ch == quote {
                if self.peek_char() == Some(quote) {
                    value.push(quote);
                    self.position += 2;
                } else {
                    self.advance(); // skip closing quote
                    return Ok(value);
                }
            } else {
                value.push(ch);
                self.advance();
            }
        }

        Err(Error::UnterminatedString(start_pos))
    }

    /// Read a number (integer or float)
    fn read_number(&mut self) -> Result<Token> {
        let start_pos = self.position;
        let mut value = String::new();
        let mut is_float = false;

        while !self.is_at_end() {
            let ch = self.current_char();

            if ch.is_ascii_digit() {
                value.push(ch);
                self.advance();
            } else if ch == '.' && !is_float && self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            value
                .parse::<f64>()
                .map(Token::FloatLiteral)
                .map_err(|_| Error::InvalidNumber(start_pos))
        } else {
            value
                .parse::<i64>()
                .map(Token::IntegerLiteral)
                .map_err(|_| Error::InvalidNumber(start_pos))
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let mut value = String::new();

        while !self.is_at_end() {
            let ch = self.current_char();

            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::from_keyword(&value).unwrap_or(Token::Identifier(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Token {
        Token::Identifier(name.to_string())
    }

    #[test]
    fn test_select_with_placeholders() {
        let mut lexer = Lexer::new("SELECT * FROM stages WHERE task_id = ? AND done = 0");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Asterisk,
                Token::From,
                ident("stages"),
                Token::Where,
                ident("task_id"),
                Token::Eq,
                Token::Placeholder,
                Token::And,
                ident("done"),
                Token::Eq,
                Token::IntegerLiteral(0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_lowercase_keywords() {
        let mut lexer = Lexer::new("select count(*) as total from issues");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0], Token::Select);
        assert_eq!(tokens[1], Token::Count);
        assert_eq!(tokens[5], Token::As);
        assert_eq!(tokens[6], ident("total"));
    }

    #[test]
    fn test_escaped_string() {
        let mut lexer = Lexer::new("UPDATE tasks SET name = 'it''s done'");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[5], Token::StringLiteral("it's done".to_string()));
    }

    #[test]
    fn test_quoted_identifier() {
        let mut lexer = Lexer::new(r#"SELECT * FROM "admin_tasks""#);
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[3], ident("admin_tasks"));
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("LIMIT 10 -3 2.5");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[1], Token::IntegerLiteral(10));
        assert_eq!(tokens[2], Token::IntegerLiteral(-3));
        assert_eq!(tokens[3], Token::FloatLiteral(2.5));
    }

    #[test]
    fn test_comparison_operators() {
        let mut lexer = Lexer::new("a < b <= c > d >= e <> f != g");
        let tokens = lexer.tokenize().unwrap();

        assert!(tokens.contains(&Token::Lt));
        assert!(tokens.contains(&Token::Lte));
        assert!(tokens.contains(&Token::Gt));
        assert!(tokens.contains(&Token::Gte));
        assert_eq!(tokens.iter().filter(|t| **t == Token::Neq).count(), 2);
    }

    #[test]
    fn test_comments() {
        let mut lexer = Lexer::new("SELECT -- pick everything\n* /* all */ FROM tasks");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Asterisk,
                Token::From,
                ident("tasks"),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Lexer::new("SELECT 'open").tokenize(),
            Err(Error::UnterminatedString(7))
        ));
        assert!(matches!(
            Lexer::new("SELECT @name").tokenize(),
            Err(Error::UnexpectedCharacter('@', 7))
        ));
    }
}
