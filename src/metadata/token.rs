//! Metadata tokens and the table identifiers encoded in their high byte.

use std::fmt;

/// Table identifiers used in the high byte of a [`Token`].
pub mod table {
    /// The type reference table.
    pub const TYPE_REF: u8 = 0x01;
    /// The type definition table.
    pub const TYPE_DEF: u8 = 0x02;
    /// The method definition table.
    pub const METHOD_DEF: u8 = 0x06;
    /// The method reference table.
    pub const METHOD_REF: u8 = 0x0A;
    /// The field reference table.
    pub const FIELD_REF: u8 = 0x0B;
}

/// A metadata token identifying a row in one of a module's metadata tables.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table
/// - The low 24 bits (bits 0-23) indicate the 1-based row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token for the given table and 1-based row index.
    #[must_use]
    pub fn from_row(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the table identifier (high byte).
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the 1-based row index within the table (low 24 bits).
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Whether this token has a zero row index (a null reference).
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(0x{:08X})", self.0)
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_splits_table_and_row() {
        let token = Token::from_row(table::METHOD_DEF, 3);
        assert_eq!(token.value(), 0x0600_0003);
        assert_eq!(token.table(), table::METHOD_DEF);
        assert_eq!(token.row(), 3);
        assert!(!token.is_null());
    }

    #[test]
    fn null_token_detected() {
        assert!(Token::from_row(table::TYPE_REF, 0).is_null());
    }

    #[test]
    fn token_displays_as_hex() {
        assert_eq!(Token::new(0x0A00_0010).to_string(), "0x0A000010");
    }
}
