//! Debug symbol parsing for rewritten modules.
//!
//! Symbol files map method tokens to sequence points (IL offset to source line/column),
//! which the rewrite engine uses to point diagnostics at the mod author's original source
//! instead of a raw IL offset. Two symbol formats exist in the wild:
//!
//! - the legacy format (`LSYM`), with fixed-width little-endian records, and
//! - the portable format (`PSYM`), with compressed-uint records.
//!
//! Module debug headers frequently lie about which format their symbol file uses (older
//! toolchains stamped the legacy format id regardless), so [`SymbolReader`] tries the
//! declared format first and falls back to the other exactly once. When neither parses,
//! the module simply loads without source locations; symbols are never load-bearing.

use std::collections::HashMap;

use crate::{
    file::Parser,
    metadata::{token::Token, DebugHeader},
    Result,
};

/// The debug header format id for the legacy symbol format.
pub const FORMAT_LEGACY: u16 = 1;
/// The debug header format id for the portable symbol format.
pub const FORMAT_PORTABLE: u16 = 2;

const LEGACY_MAGIC: &[u8; 4] = b"LSYM";
const PORTABLE_MAGIC: &[u8; 4] = b"PSYM";

/// One mapping from an IL instruction index to a source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePoint {
    /// The IL instruction index the point covers.
    pub instruction: u32,
    /// The 1-based source line.
    pub line: u32,
    /// The 1-based source column.
    pub column: u16,
}

/// The debug info known for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    points: Vec<SequencePoint>,
}

impl DebugInfo {
    /// The shared no-symbols sentinel.
    #[must_use]
    pub fn empty() -> Self {
        DebugInfo::default()
    }

    /// Whether this method has any sequence points.
    #[must_use]
    pub fn has_points(&self) -> bool {
        !self.points.is_empty()
    }

    /// The sequence point covering the given IL instruction index: the nearest point at
    /// or before it, or `None` when the method has no point that early.
    #[must_use]
    pub fn nearest(&self, instruction: u32) -> Option<&SequencePoint> {
        self.points
            .iter()
            .filter(|p| p.instruction <= instruction)
            .max_by_key(|p| p.instruction)
    }
}

/// Reads method debug info out of one module's symbol data.
#[derive(Debug, Default)]
pub struct SymbolReader {
    data: Vec<u8>,
    methods: HashMap<Token, DebugInfo>,
    loaded: bool,
}

impl SymbolReader {
    /// Wrap raw symbol file bytes. Nothing is parsed until
    /// [`process_debug_header`](Self::process_debug_header) runs.
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        SymbolReader {
            data,
            methods: HashMap::new(),
            loaded: false,
        }
    }

    /// Parse the symbol data using the format the module's debug header declares,
    /// falling back to the other format once if that fails.
    ///
    /// Returns whether any format parsed. On failure the reader stays usable and
    /// [`read`](Self::read) returns empty debug info for every token.
    pub fn process_debug_header(&mut self, header: &DebugHeader) -> bool {
        let attempts: [fn(&[u8]) -> Result<HashMap<Token, DebugInfo>>; 2] =
            if header.format == FORMAT_PORTABLE {
                [parse_portable, parse_legacy]
            } else {
                [parse_legacy, parse_portable]
            };

        for parse in attempts {
            if let Ok(methods) = parse(&self.data) {
                self.methods = methods;
                self.loaded = true;
                return true;
            }
        }
        false
    }

    /// Whether a symbol format parsed successfully.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The debug info for a method token. Never fails; unknown tokens and unparsed
    /// symbol data both yield empty info.
    #[must_use]
    pub fn read(&self, token: Token) -> DebugInfo {
        self.methods.get(&token).cloned().unwrap_or_default()
    }
}

fn parse_legacy(data: &[u8]) -> Result<HashMap<Token, DebugInfo>> {
    let mut parser = Parser::new(data);
    parser.expect_magic(LEGACY_MAGIC)?;

    let method_count = parser.read_u32()?;
    let mut methods = HashMap::new();
    for _ in 0..method_count {
        let token = Token::new(parser.read_u32()?);
        let point_count = parser.read_u32()?;
        if point_count as usize > parser.len() - parser.pos() {
            return Err(malformed_error!(
                "sequence point count {} exceeds remaining symbol data",
                point_count
            ));
        }
        let mut points = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            points.push(SequencePoint {
                instruction: parser.read_u32()?,
                line: parser.read_u32()?,
                column: parser.read_u16()?,
            });
        }
        methods.insert(token, DebugInfo { points });
    }
    Ok(methods)
}

fn parse_portable(data: &[u8]) -> Result<HashMap<Token, DebugInfo>> {
    let mut parser = Parser::new(data);
    parser.expect_magic(PORTABLE_MAGIC)?;

    let method_count = parser.read_compressed_uint()?;
    let mut methods = HashMap::new();
    for _ in 0..method_count {
        let token = Token::new(parser.read_u32()?);
        let point_count = parser.read_compressed_uint()?;
        if point_count as usize > parser.len() - parser.pos() {
            return Err(malformed_error!(
                "sequence point count {} exceeds remaining symbol data",
                point_count
            ));
        }
        let mut points = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            points.push(SequencePoint {
                instruction: parser.read_compressed_uint()?,
                line: parser.read_compressed_uint()?,
                column: parser.read_compressed_uint()? as u16,
            });
        }
        methods.insert(token, DebugInfo { points });
    }
    Ok(methods)
}

/// Holds symbol readers for every module in a load batch, keyed by module name.
///
/// Lookups are case-insensitive since symbol files on disk don't reliably match the
/// module's declared casing.
#[derive(Debug, Default)]
pub struct SymbolProvider {
    readers: HashMap<String, SymbolReader>,
}

impl SymbolProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        SymbolProvider::default()
    }

    /// Register symbol data for a module, parsing per its debug header.
    ///
    /// Returns whether the data parsed in some format. Unparseable data is discarded.
    pub fn try_add_symbol_data(
        &mut self,
        module_name: &str,
        data: Vec<u8>,
        header: &DebugHeader,
    ) -> bool {
        let mut reader = SymbolReader::new(data);
        if reader.process_debug_header(header) {
            self.readers.insert(module_name.to_lowercase(), reader);
            true
        } else {
            false
        }
    }

    /// The symbol reader for a module, if one was registered.
    pub fn get_reader(&mut self, module_name: &str) -> Option<&mut SymbolReader> {
        self.readers.get_mut(&module_name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::parser::write_compressed_uint;

    fn legacy_data() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(LEGACY_MAGIC);
        data.extend_from_slice(&1u32.to_le_bytes()); // one method
        data.extend_from_slice(&0x0600_0001u32.to_le_bytes());
        data.extend_from_slice(&2u32.to_le_bytes()); // two points
        for (instruction, line, column) in [(0u32, 10u32, 5u16), (3, 12, 9)] {
            data.extend_from_slice(&instruction.to_le_bytes());
            data.extend_from_slice(&line.to_le_bytes());
            data.extend_from_slice(&column.to_le_bytes());
        }
        data
    }

    fn portable_data() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(PORTABLE_MAGIC);
        write_compressed_uint(&mut data, 1).unwrap();
        data.extend_from_slice(&0x0600_0001u32.to_le_bytes());
        write_compressed_uint(&mut data, 1).unwrap();
        write_compressed_uint(&mut data, 2).unwrap(); // instruction
        write_compressed_uint(&mut data, 42).unwrap(); // line
        write_compressed_uint(&mut data, 7).unwrap(); // column
        data
    }

    #[test]
    fn legacy_format_parses_per_header() {
        let mut reader = SymbolReader::new(legacy_data());
        assert!(reader.process_debug_header(&DebugHeader {
            format: FORMAT_LEGACY,
            age: 1
        }));

        let info = reader.read(Token::new(0x0600_0001));
        assert_eq!(info.nearest(4).map(|p| p.line), Some(12));
        assert_eq!(info.nearest(1).map(|p| p.line), Some(10));
    }

    #[test]
    fn mislabeled_header_falls_back_to_other_format() {
        // the header claims legacy, but the data is portable
        let mut reader = SymbolReader::new(portable_data());
        assert!(reader.process_debug_header(&DebugHeader {
            format: FORMAT_LEGACY,
            age: 1
        }));

        let info = reader.read(Token::new(0x0600_0001));
        assert_eq!(info.nearest(2).map(|p| p.line), Some(42));
    }

    #[test]
    fn unparseable_data_degrades_to_no_symbols() {
        let mut reader = SymbolReader::new(b"garbage that is no symbol format".to_vec());
        assert!(!reader.process_debug_header(&DebugHeader {
            format: FORMAT_LEGACY,
            age: 1
        }));
        assert!(!reader.is_loaded());
        assert!(!reader.read(Token::new(0x0600_0001)).has_points());
    }

    #[test]
    fn unknown_token_yields_empty_info() {
        let mut reader = SymbolReader::new(legacy_data());
        reader.process_debug_header(&DebugHeader {
            format: FORMAT_LEGACY,
            age: 1,
        });
        assert_eq!(reader.read(Token::new(0x0600_00FF)), DebugInfo::empty());
    }

    #[test]
    fn provider_lookup_is_case_insensitive() {
        let mut provider = SymbolProvider::new();
        assert!(provider.try_add_symbol_data(
            "ExampleMod",
            legacy_data(),
            &DebugHeader {
                format: FORMAT_LEGACY,
                age: 1
            }
        ));
        assert!(provider.get_reader("examplemod").is_some());
        assert!(provider.get_reader("EXAMPLEMOD").is_some());
        assert!(provider.get_reader("OtherMod").is_none());
    }

    #[test]
    fn nearest_before_first_point_is_none() {
        let info = DebugInfo {
            points: vec![SequencePoint {
                instruction: 5,
                line: 1,
                column: 1,
            }],
        };
        assert!(info.nearest(4).is_none());
    }
}
