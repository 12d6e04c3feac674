//! Method bodies: instruction streams and exception handler regions.
//!
//! Branch operands and exception region boundaries reference instructions by index, so any
//! insertion shifts everything after the insertion point. [`MethodBody::insert_before`] owns
//! that invariant: it relinks every branch target and region boundary in the same pass.

use crate::metadata::instruction::{Instruction, Operand};

/// An exception handler region within a method body.
///
/// All boundaries are instruction indices; `try_end` and `handler_end` are exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRegion {
    /// First instruction covered by the try block.
    pub try_start: u32,
    /// One past the last instruction covered by the try block.
    pub try_end: u32,
    /// First instruction of the handler.
    pub handler_start: u32,
    /// One past the last instruction of the handler.
    pub handler_end: u32,
}

/// The body of a method definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodBody {
    /// The number of local variable slots.
    pub locals: u16,
    /// The instruction stream.
    pub instructions: Vec<Instruction>,
    /// Exception handler regions, outermost first.
    pub regions: Vec<ExceptionRegion>,
}

impl MethodBody {
    /// Create a body with the given instructions and no locals or regions.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        MethodBody {
            locals: 0,
            instructions,
            regions: Vec::new(),
        }
    }

    /// Replace the instruction at `index` in place.
    ///
    /// Branch targets are unaffected since no positions shift.
    pub fn replace(&mut self, index: usize, instruction: Instruction) {
        self.instructions[index] = instruction;
    }

    /// Insert instructions before `index`, relinking all branch targets and exception
    /// region boundaries that the insertion shifts.
    ///
    /// Positions strictly after `index` shift by the inserted count. Positions equal to
    /// `index` are left unchanged, so a branch to the original instruction now flows through
    /// the inserted sequence first; the same rule keeps an exception region that started at
    /// the original instruction covering the inserted sequence.
    ///
    /// Returns the number of instructions inserted.
    pub fn insert_before(&mut self, index: usize, new: Vec<Instruction>) -> usize {
        let count = new.len();
        if count == 0 {
            return 0;
        }
        let shift = count as u32;
        let pivot = index as u32;

        let adjust = |position: &mut u32| {
            if *position > pivot {
                *position += shift;
            }
        };

        for instruction in &mut self.instructions {
            if instruction.opcode.is_branch() {
                if let Operand::Target(target) = &mut instruction.operand {
                    adjust(target);
                }
            }
        }

        for region in &mut self.regions {
            adjust(&mut region.try_start);
            adjust(&mut region.try_end);
            adjust(&mut region.handler_start);
            adjust(&mut region.handler_end);
        }

        self.instructions.splice(index..index, new);
        count
    }
}
