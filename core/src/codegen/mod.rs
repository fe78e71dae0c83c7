//! Translation of byte-code into cacheable compiled units.
//!
//! A `CodeGenerator` turns the instructions starting at one address into a
//! `CompiledUnit`. The default generator decodes Z-machine instructions into
//! an `Instruction` list that is run by the dispatch loop in `exec`.

mod decode;
mod exec;
mod opcode;

use std::fmt;

use anyhow::Result;

use crate::header::Header;
use crate::memory::Memory;
use crate::vm::ExecContext;

pub use decode::{Branch, BranchTarget, Instruction, Operand, decode_instruction};
pub use exec::Block;
pub use opcode::{OpClass, Opcode};

pub type RoutineResult = Result<()>;

/// Directly invokable form of the code at one address. Executing it must leave
/// the program counter at the address of the next unit to run.
pub trait Routine: Send + Sync {
    fn execute(&self, ctx: &mut ExecContext<'_>) -> RoutineResult;
}

pub struct CompiledUnit {
    pub pc: u32,
    pub name: Option<String>,
    code: Box<dyn Routine>,
}

impl CompiledUnit {
    pub fn new(pc: u32, name: Option<String>, code: Box<dyn Routine>) -> Self {
        Self { pc, name, code }
    }

    #[inline]
    pub fn execute(&self, ctx: &mut ExecContext<'_>) -> RoutineResult {
        self.code.execute(ctx)
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("pc", &format_args!("0x{:05x}", self.pc))
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (0x{:05x})", name, self.pc),
            None => write!(f, "unit 0x{:05x}", self.pc),
        }
    }
}

pub trait CodeGenerator {
    /// Fails only with an address-identified `VmError::Compile`.
    fn compile(&self, image: &Memory, header: &Header, pc: u32) -> Result<CompiledUnit>;
}

/// Longest straight-line run folded into one unit.
pub const MAX_UNIT_INSTRUCTIONS: usize = 64;

/// Default generator: decodes a basic block ending at the first instruction
/// that can transfer control or hand control back to the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZCodeGenerator;

impl CodeGenerator for ZCodeGenerator {
    fn compile(&self, image: &Memory, header: &Header, pc: u32) -> Result<CompiledUnit> {
        let first = decode_instruction(image, header.version, pc)?;
        let name = format!("{}@{:05x}", first.opcode.mnemonic(), pc);
        let mut instructions = vec![first];
        while instructions.len() < MAX_UNIT_INSTRUCTIONS {
            let Some(last) = instructions.last() else {
                break;
            };
            if last.opcode.ends_unit() {
                break;
            }
            // A later decode failure is only fatal if execution actually gets there.
            match decode_instruction(image, header.version, last.next) {
                Ok(ins) => instructions.push(ins),
                Err(_) => break,
            }
        }
        Ok(CompiledUnit::new(pc, Some(name), Box::new(Block::new(instructions))))
    }
}
