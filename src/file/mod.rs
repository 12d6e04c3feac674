//! Low-level file and byte stream utilities.

pub mod parser;

pub use parser::Parser;
