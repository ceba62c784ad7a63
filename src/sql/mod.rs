//! Instruction module
//!
//! Tokenizing and parsing of query instructions, and routing of an
//! instruction to the entity type it targets.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod router;
pub mod token;

pub use ast::{CompareOp, Condition, LimitSlot, OrderItem, Slot, Template};
pub use lexer::Lexer;
pub use parser::{parse, Parser};
pub use router::Router;
pub use token::Token;
