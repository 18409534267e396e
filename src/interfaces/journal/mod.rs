//! JSON-lines command journal: one back-office operation per line.

pub mod command;
pub mod interpreter;
pub mod reader;
