//! Parsed instruction templates
//!
//! A template is an instruction with its value positions left open: each
//! slot is either a literal or a positional `?` parameter, filled in when
//! the statement runs.

use serde_json::Value;

use crate::executor::query::OnConflict;

/// A value position inside an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Literal written into the instruction
    Literal(Value),
    /// Zero-based index of a `?` parameter
    Param(usize),
}

/// Comparison operator in a `WHERE` condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=` (and `IS NULL`)
    Eq,
    /// `<`
    Lt,
}

/// One `field <op> slot` condition. Conditions are joined by `AND`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub slot: Slot,
}

/// One `ORDER BY` item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub field: String,
    pub ascending: bool,
}

/// Result-size cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSlot {
    Literal(usize),
    /// `LIMIT ?` always takes the last supplied parameter
    LastParam,
}

/// Shape of a parsed instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    Select {
        table: String,
        /// `Some(alias)` for `COUNT(*) [AS alias]`
        count: Option<String>,
        conditions: Vec<Condition>,
        order_by: Vec<OrderItem>,
        limit: Option<LimitSlot>,
    },
    Insert {
        table: String,
        on_conflict: OnConflict,
        columns: Vec<String>,
        values: Vec<Slot>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Slot)>,
        conditions: Vec<Condition>,
    },
    Delete {
        table: String,
        conditions: Vec<Condition>,
    },
    /// `CREATE TABLE` / `CREATE INDEX`; accepted and ignored
    Schema,
}

impl Template {
    /// Table name as written in the instruction, if any
    pub fn table(&self) -> Option<&str> {
        match self {
            Template::Select { table, .. }
            | Template::Insert { table, .. }
            | Template::Update { table, .. }
            | Template::Delete { table, .. } => Some(table),
            Template::Schema => None,
        }
    }

    /// Whether this shape is answered by `get`/`all` rather than `run`
    pub fn is_read(&self) -> bool {
        matches!(self, Template::Select { .. })
    }
}
