//! This module contains a lightweight sqlite wrapper on top of the sqlite3-sys crate
//! It covers what the draping stores need: prepared statements, blob columns,
//! transactions and pragma handling.

mod connection;
mod row;
mod statement;

#[derive(Debug, Copy, Clone)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
    Create,
}

pub use connection::Connection;
pub use row::ColumnType;
pub use row::Row;
pub use statement::Statement;

pub type Error = inf::Error;
pub type Result<T = ()> = inf::Result<T>;

/// Quote an identifier (table or column name) for use in a sql statement
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
