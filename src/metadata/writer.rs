//! Serializes [`Module`] structures back to module image bytes.
//!
//! Mirrors [`crate::metadata::reader`] exactly; a parse/serialize round trip is
//! byte-identical, which is what makes rewrite idempotence observable at the byte level.

use crate::{
    file::parser::{write_compressed_uint, write_prefixed_string_utf8},
    metadata::{
        instruction::{Instruction, Operand},
        reader::{FORMAT_VERSION, MAGIC},
        MethodDef, Module,
    },
    Result,
};

/// Serialize a module to image bytes.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if a string or table exceeds the encodable range.
pub fn write_module(module: &Module) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&module.flags.bits().to_le_bytes());
    write_prefixed_string_utf8(&mut out, &module.name)?;

    match &module.debug_header {
        None => out.push(0),
        Some(header) => {
            out.push(1);
            out.extend_from_slice(&header.format.to_le_bytes());
            out.extend_from_slice(&header.age.to_le_bytes());
        }
    }

    write_count(&mut out, module.assembly_refs.len());
    for name in &module.assembly_refs {
        write_prefixed_string_utf8(&mut out, name)?;
    }

    write_count(&mut out, module.type_refs.len());
    for row in &module.type_refs {
        write_prefixed_string_utf8(&mut out, &row.full_name)?;
    }

    write_count(&mut out, module.method_refs.len());
    for row in &module.method_refs {
        out.extend_from_slice(&row.declaring_type.to_le_bytes());
        write_prefixed_string_utf8(&mut out, &row.name)?;
        write_prefixed_string_utf8(&mut out, &row.return_type)?;
        write_compressed_uint(&mut out, row.params.len() as u32)?;
        for param in &row.params {
            write_prefixed_string_utf8(&mut out, param)?;
        }
    }

    write_count(&mut out, module.field_refs.len());
    for row in &module.field_refs {
        out.extend_from_slice(&row.declaring_type.to_le_bytes());
        write_prefixed_string_utf8(&mut out, &row.name)?;
        write_prefixed_string_utf8(&mut out, &row.field_type)?;
    }

    write_count(&mut out, module.types.len());
    for type_def in &module.types {
        write_prefixed_string_utf8(&mut out, &type_def.full_name)?;
        write_count(&mut out, type_def.methods.len());
        for method in &type_def.methods {
            write_method(&mut out, method)?;
        }
    }

    Ok(out)
}

fn write_count(out: &mut Vec<u8>, count: usize) {
    out.extend_from_slice(&(count as u32).to_le_bytes());
}

fn write_method(out: &mut Vec<u8>, method: &MethodDef) -> Result<()> {
    write_prefixed_string_utf8(out, &method.name)?;
    out.extend_from_slice(&method.body.locals.to_le_bytes());

    write_count(out, method.body.instructions.len());
    for instruction in &method.body.instructions {
        write_instruction(out, instruction)?;
    }

    write_count(out, method.body.regions.len());
    for region in &method.body.regions {
        out.extend_from_slice(&region.try_start.to_le_bytes());
        out.extend_from_slice(&region.try_end.to_le_bytes());
        out.extend_from_slice(&region.handler_start.to_le_bytes());
        out.extend_from_slice(&region.handler_end.to_le_bytes());
    }

    Ok(())
}

fn write_instruction(out: &mut Vec<u8>, instruction: &Instruction) -> Result<()> {
    out.push(instruction.opcode.byte());
    match &instruction.operand {
        Operand::None => {}
        Operand::Int32(value) => out.extend_from_slice(&value.to_le_bytes()),
        Operand::String(value) => write_prefixed_string_utf8(out, value)?,
        Operand::Slot(value) => out.extend_from_slice(&value.to_le_bytes()),
        Operand::Method(value)
        | Operand::Field(value)
        | Operand::Type(value)
        | Operand::Target(value) => out.extend_from_slice(&value.to_le_bytes()),
    }
    Ok(())
}
