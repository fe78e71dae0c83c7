use anyhow::Result;

use crate::error::VmError;
use crate::host::Variable;
use crate::memory::Memory;

use super::opcode::{OpClass, Opcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Const(u16),
    Var(Variable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTarget {
    ReturnFalse,
    ReturnTrue,
    Address(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    /// Branch when the condition equals this polarity.
    pub on_true: bool,
    pub target: BranchTarget,
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub addr: u32,
    /// Address of the following instruction.
    pub next: u32,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    pub store: Option<Variable>,
    pub branch: Option<Branch>,
    /// Inline z-string of `print`/`print_ret`.
    pub text: Option<u32>,
}

const OPERAND_LARGE: u8 = 0b00;
const OPERAND_SMALL: u8 = 0b01;
const OPERAND_VAR: u8 = 0b10;
const OPERAND_OMITTED: u8 = 0b11;

struct Cursor<'m> {
    memory: &'m Memory,
    start: u32,
    pos: usize,
}

impl<'m> Cursor<'m> {
    fn byte(&mut self) -> Result<u8> {
        let b = self
            .memory
            .read8(self.pos)
            .map_err(|e| VmError::compile(self.start, e.to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn word(&mut self) -> Result<u16> {
        let w = self
            .memory
            .read16(self.pos)
            .map_err(|e| VmError::compile(self.start, e.to_string()))?;
        self.pos += 2;
        Ok(w)
    }

    fn operand(&mut self, kind: u8) -> Result<Option<Operand>> {
        let op = match kind {
            OPERAND_LARGE => Operand::Const(self.word()?),
            OPERAND_SMALL => Operand::Const(self.byte()? as u16),
            OPERAND_VAR => Operand::Var(Variable(self.byte()?)),
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    /// Operands described by one or more type bytes (4 slots each); the first
    /// omitted slot ends the list.
    fn typed_operands(&mut self, type_bytes: usize, out: &mut Vec<Operand>) -> Result<()> {
        let mut types = Vec::with_capacity(type_bytes * 4);
        for _ in 0..type_bytes {
            let b = self.byte()?;
            types.extend((0..4).map(|i| (b >> (6 - 2 * i)) & 0b11));
        }
        for kind in types {
            if kind == OPERAND_OMITTED {
                break;
            }
            if let Some(op) = self.operand(kind)? {
                out.push(op);
            }
        }
        Ok(())
    }

    fn branch(&mut self) -> Result<Branch> {
        let b = self.byte()?;
        let on_true = b & 0x80 != 0;
        let offset: i16 = if b & 0x40 != 0 {
            (b & 0x3F) as i16
        } else {
            let lo = self.byte()?;
            let raw = (((b & 0x3F) as u16) << 8) | lo as u16;
            // sign-extend 14 bits
            ((raw << 2) as i16) >> 2
        };
        let target = match offset {
            0 => BranchTarget::ReturnFalse,
            1 => BranchTarget::ReturnTrue,
            off => BranchTarget::Address((self.pos as i64 + off as i64 - 2) as u32),
        };
        Ok(Branch { on_true, target })
    }

    /// Skip an encoded z-string, returning its start address.
    fn text(&mut self) -> Result<u32> {
        let start = self.pos as u32;
        loop {
            if self.word()? & 0x8000 != 0 {
                return Ok(start);
            }
        }
    }
}

/// Decode the instruction at `addr` (versions 5 and 8).
pub fn decode_instruction(memory: &Memory, version: u8, addr: u32) -> Result<Instruction> {
    debug_assert!(version == 5 || version == 8);
    let mut cur = Cursor {
        memory,
        start: addr,
        pos: addr as usize,
    };
    let first = cur.byte()?;
    let mut operands = Vec::new();

    let (class, number) = match first {
        0xBE => {
            let number = cur.byte()?;
            cur.typed_operands(1, &mut operands)?;
            (OpClass::Ext, number)
        }
        0x00..=0x7F => {
            // long form: two operands, bit 6/5 select variable vs small constant
            for bit in [0x40u8, 0x20] {
                let kind = if first & bit != 0 { OPERAND_VAR } else { OPERAND_SMALL };
                if let Some(op) = cur.operand(kind)? {
                    operands.push(op);
                }
            }
            (OpClass::TwoOp, first & 0x1F)
        }
        0x80..=0xBF => {
            let kind = (first >> 4) & 0b11;
            match cur.operand(kind)? {
                Some(op) => {
                    operands.push(op);
                    (OpClass::OneOp, first & 0x0F)
                }
                None => (OpClass::ZeroOp, first & 0x0F),
            }
        }
        0xC0..=0xFF => {
            let number = first & 0x1F;
            let class = if first & 0x20 == 0 { OpClass::TwoOp } else { OpClass::Var };
            // call_vs2 and call_vn2 carry a second type byte
            let type_bytes = if class == OpClass::Var && (number == 12 || number == 26) {
                2
            } else {
                1
            };
            cur.typed_operands(type_bytes, &mut operands)?;
            (class, number)
        }
    };

    let opcode = Opcode::lookup(class, number).ok_or_else(|| {
        VmError::compile(
            addr,
            format!("unsupported opcode {:?} #{} (first byte 0x{:02x})", class, number, first),
        )
    })?;

    let store = if opcode.stores() {
        Some(Variable(cur.byte()?))
    } else {
        None
    };
    let branch = if opcode.branches() { Some(cur.branch()?) } else { None };
    let text = if opcode.has_text() { Some(cur.text()?) } else { None };

    Ok(Instruction {
        addr,
        next: cur.pos as u32,
        opcode,
        operands,
        store,
        branch,
        text,
    })
}
