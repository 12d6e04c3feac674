//! Reads module images from raw bytes into [`Module`] structures.
//!
//! The image layout is little-endian throughout: a fixed header (magic, format version,
//! module flags, name, optional debug header), then the assembly/type/method/field reference
//! tables, then type definitions with encoded method bodies. [`crate::metadata::writer`]
//! produces the same layout, and the pair round-trips byte-identically.

use crate::{
    file::parser::Parser,
    metadata::{
        body::{ExceptionRegion, MethodBody},
        instruction::{Instruction, OpCode, Operand, OperandKind},
        member::{FieldRefRow, MethodRefRow, TypeRefRow},
        DebugHeader, MethodDef, Module, ModuleFlags, TypeDef,
    },
    Result,
};

/// The module image magic bytes.
pub const MAGIC: &[u8; 4] = b"MSCP";

/// The current module image format version.
pub const FORMAT_VERSION: u16 = 1;

/// Parse a module image from raw bytes.
///
/// # Errors
/// - [`crate::Error::Empty`] if the input is empty
/// - [`crate::Error::NotSupported`] for a wrong magic or unknown format version
/// - [`crate::Error::OutOfBounds`] / [`crate::Error::Malformed`] for truncated or corrupt data
pub fn read_module(data: &[u8]) -> Result<Module> {
    if data.is_empty() {
        return Err(crate::Error::Empty);
    }

    let mut parser = Parser::new(data);
    parser.expect_magic(MAGIC)?;

    let version = parser.read_u16()?;
    if version != FORMAT_VERSION {
        return Err(crate::Error::NotSupported);
    }

    let flags = ModuleFlags::from_bits_truncate(parser.read_u32()?);
    let name = parser.read_prefixed_string_utf8()?;

    let debug_header = match parser.read_u8()? {
        0 => None,
        1 => Some(DebugHeader {
            format: parser.read_u16()?,
            age: parser.read_u32()?,
        }),
        other => return Err(malformed_error!("Invalid debug header marker - {}", other)),
    };

    let assembly_refs = read_string_table(&mut parser)?;

    let type_ref_count = read_count(&mut parser)?;
    let mut type_refs = Vec::with_capacity(type_ref_count);
    for _ in 0..type_ref_count {
        type_refs.push(TypeRefRow {
            full_name: parser.read_prefixed_string_utf8()?,
        });
    }

    let method_ref_count = read_count(&mut parser)?;
    let mut method_refs = Vec::with_capacity(method_ref_count);
    for _ in 0..method_ref_count {
        let declaring_type = parser.read_u32()?;
        let name = parser.read_prefixed_string_utf8()?;
        let return_type = parser.read_prefixed_string_utf8()?;
        let param_count = parser.read_compressed_uint()? as usize;
        let mut params = Vec::with_capacity(param_count.min(64));
        for _ in 0..param_count {
            params.push(parser.read_prefixed_string_utf8()?);
        }
        method_refs.push(MethodRefRow {
            declaring_type,
            name,
            return_type,
            params,
        });
    }

    let field_ref_count = read_count(&mut parser)?;
    let mut field_refs = Vec::with_capacity(field_ref_count);
    for _ in 0..field_ref_count {
        field_refs.push(FieldRefRow {
            declaring_type: parser.read_u32()?,
            name: parser.read_prefixed_string_utf8()?,
            field_type: parser.read_prefixed_string_utf8()?,
        });
    }

    let type_count = read_count(&mut parser)?;
    let mut types = Vec::with_capacity(type_count);
    for _ in 0..type_count {
        let full_name = parser.read_prefixed_string_utf8()?;
        let method_count = read_count(&mut parser)?;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(read_method(&mut parser)?);
        }
        types.push(TypeDef { full_name, methods });
    }

    // validate reference indices so later table lookups can't dangle
    let module = Module {
        name,
        flags,
        debug_header,
        assembly_refs,
        type_refs,
        method_refs,
        field_refs,
        types,
    };
    validate_references(&module)?;

    Ok(module)
}

fn read_count(parser: &mut Parser<'_>) -> Result<usize> {
    let count = parser.read_u32()? as usize;
    // each entry takes at least one byte, so a count beyond the remaining
    // data is corrupt and would only inflate allocations
    if count > parser.len() - parser.pos() {
        return Err(malformed_error!("Table count exceeds remaining data - {}", count));
    }
    Ok(count)
}

fn read_string_table(parser: &mut Parser<'_>) -> Result<Vec<String>> {
    let count = read_count(parser)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(parser.read_prefixed_string_utf8()?);
    }
    Ok(entries)
}

fn read_method(parser: &mut Parser<'_>) -> Result<MethodDef> {
    let name = parser.read_prefixed_string_utf8()?;
    let locals = parser.read_u16()?;

    let instruction_count = read_count(parser)?;
    let mut instructions = Vec::with_capacity(instruction_count);
    for _ in 0..instruction_count {
        instructions.push(read_instruction(parser)?);
    }

    let region_count = read_count(parser)?;
    let mut regions = Vec::with_capacity(region_count);
    for _ in 0..region_count {
        regions.push(ExceptionRegion {
            try_start: parser.read_u32()?,
            try_end: parser.read_u32()?,
            handler_start: parser.read_u32()?,
            handler_end: parser.read_u32()?,
        });
    }

    Ok(MethodDef {
        name,
        body: MethodBody {
            locals,
            instructions,
            regions,
        },
    })
}

fn read_instruction(parser: &mut Parser<'_>) -> Result<Instruction> {
    let opcode = OpCode::from_byte(parser.read_u8()?)?;
    let operand = match opcode.operand_kind() {
        OperandKind::None => Operand::None,
        OperandKind::Int32 => Operand::Int32(parser.read_i32()?),
        OperandKind::String => Operand::String(parser.read_prefixed_string_utf8()?),
        OperandKind::Slot => Operand::Slot(parser.read_u16()?),
        OperandKind::Method => Operand::Method(parser.read_u32()?),
        OperandKind::Field => Operand::Field(parser.read_u32()?),
        OperandKind::Type => Operand::Type(parser.read_u32()?),
        OperandKind::Target => Operand::Target(parser.read_u32()?),
    };
    Ok(Instruction { opcode, operand })
}

fn validate_references(module: &Module) -> Result<()> {
    let type_refs = module.type_refs.len() as u32;
    let method_refs = module.method_refs.len() as u32;
    let field_refs = module.field_refs.len() as u32;

    for row in &module.method_refs {
        if row.declaring_type >= type_refs {
            return Err(malformed_error!(
                "Method ref '{}' has dangling declaring type - {}",
                row.name,
                row.declaring_type
            ));
        }
    }
    for row in &module.field_refs {
        if row.declaring_type >= type_refs {
            return Err(malformed_error!(
                "Field ref '{}' has dangling declaring type - {}",
                row.name,
                row.declaring_type
            ));
        }
    }

    for type_def in &module.types {
        for method in &type_def.methods {
            let body_len = method.body.instructions.len() as u32;
            for instruction in &method.body.instructions {
                let in_range = match instruction.operand {
                    Operand::Method(index) => index < method_refs,
                    Operand::Field(index) => index < field_refs,
                    Operand::Type(index) => index < type_refs,
                    Operand::Target(index) => index < body_len,
                    _ => true,
                };
                if !in_range {
                    return Err(malformed_error!(
                        "Dangling operand in {}.{} - {}",
                        type_def.full_name,
                        method.name,
                        instruction
                    ));
                }
            }
        }
    }

    Ok(())
}
