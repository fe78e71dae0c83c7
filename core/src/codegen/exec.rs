//! Dispatch loop for decoded instruction blocks.

use anyhow::{Result, bail};

use crate::error::VmError;
use crate::host::{Order, Variable};
use crate::persist::{Snapshot, encode_snapshot};
use crate::vm::ExecContext;

use super::decode::{Instruction, Operand};
use super::opcode::Opcode;
use super::{Routine, RoutineResult};

/// A straight-line run of instructions; only the last one can leave it.
#[derive(Debug, Clone)]
pub struct Block {
    instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl Routine for Block {
    fn execute(&self, ctx: &mut ExecContext<'_>) -> RoutineResult {
        for ins in &self.instructions {
            ctx.machine.state.pc = ins.next;
            step(ctx, ins)?;
        }
        Ok(())
    }
}

/// Operand values, evaluated left to right (stack operands pop in order).
fn operand_values(ctx: &mut ExecContext<'_>, operands: &[Operand]) -> Result<Vec<u16>> {
    operands
        .iter()
        .map(|op| match *op {
            Operand::Const(v) => Ok(v),
            Operand::Var(var) => ctx.read_var(var),
        })
        .collect()
}

#[inline]
fn arg(ops: &[u16], i: usize) -> u16 {
    ops.get(i).copied().unwrap_or(0)
}

fn need(ins: &Instruction, ops: &[u16], n: usize) -> Result<()> {
    if ops.len() < n {
        bail!(
            "{} at 0x{:05x} needs {} operand(s), got {}",
            ins.opcode.mnemonic(),
            ins.addr,
            n,
            ops.len()
        );
    }
    Ok(())
}

fn branch(ctx: &mut ExecContext<'_>, ins: &Instruction, condition: bool) -> Result<()> {
    match &ins.branch {
        Some(b) => ctx.branch(b, condition),
        None => Ok(()),
    }
}

fn shift(value: u16, places: u16, arithmetic: bool) -> u16 {
    let places = places as i16;
    match places {
        0 => value,
        1..=15 => value << places,
        -15..=-1 if arithmetic => ((value as i16) >> -places) as u16,
        -15..=-1 => value >> -places,
        _ if arithmetic && (value as i16) < 0 => 0xFFFF,
        _ => 0,
    }
}

fn step(ctx: &mut ExecContext<'_>, ins: &Instruction) -> Result<()> {
    use Opcode::*;

    let ops = operand_values(ctx, &ins.operands)?;
    let a = arg(&ops, 0);
    let b = arg(&ops, 1);
    let store = ins.store;

    match ins.opcode {
        // arithmetic and logic
        Add => ctx.store(store, (a as i16).wrapping_add(b as i16) as u16)?,
        Sub => ctx.store(store, (a as i16).wrapping_sub(b as i16) as u16)?,
        Mul => ctx.store(store, (a as i16).wrapping_mul(b as i16) as u16)?,
        Div | Mod => {
            need(ins, &ops, 2)?;
            if b == 0 {
                return Err(VmError::DivisionByZero { addr: ins.addr }.into());
            }
            let (x, y) = (a as i16, b as i16);
            let value = if ins.opcode == Div { x.wrapping_div(y) } else { x.wrapping_rem(y) };
            ctx.store(store, value as u16)?;
        }
        Or => ctx.store(store, a | b)?,
        And => ctx.store(store, a & b)?,
        Not => ctx.store(store, !a)?,
        LogShift => ctx.store(store, shift(a, b, false))?,
        ArtShift => ctx.store(store, shift(a, b, true))?,

        // comparisons
        Je => {
            need(ins, &ops, 1)?;
            branch(ctx, ins, ops[1..].contains(&a))?
        }
        Jl => branch(ctx, ins, (a as i16) < (b as i16))?,
        Jg => branch(ctx, ins, (a as i16) > (b as i16))?,
        Jz => branch(ctx, ins, a == 0)?,
        Test => branch(ctx, ins, a & b == b)?,
        DecChk | IncChk => {
            let var = Variable(a as u8);
            let current = ctx.machine.read_var_indirect(var)? as i16;
            let next = if ins.opcode == IncChk {
                current.wrapping_add(1)
            } else {
                current.wrapping_sub(1)
            };
            ctx.machine.write_var_indirect(var, next as u16)?;
            let condition = if ins.opcode == IncChk { next > b as i16 } else { next < b as i16 };
            branch(ctx, ins, condition)?
        }
        Jump => {
            let target = ins.next as i64 + (a as i16) as i64 - 2;
            ctx.jump(target as u32);
        }

        // variables
        Store => ctx.machine.write_var_indirect(Variable(a as u8), b)?,
        Load => {
            let value = ctx.machine.read_var_indirect(Variable(a as u8))?;
            ctx.store(store, value)?
        }
        Inc | Dec => {
            let var = Variable(a as u8);
            let current = ctx.machine.read_var_indirect(var)?;
            let next = if ins.opcode == Inc {
                current.wrapping_add(1)
            } else {
                current.wrapping_sub(1)
            };
            ctx.machine.write_var_indirect(var, next)?
        }
        Push => ctx.push(a)?,
        Pull => {
            let value = ctx.pop()?;
            ctx.machine.write_var_indirect(Variable(a as u8), value)?
        }
        Loadw => {
            let value = ctx.machine.memory.read16(a.wrapping_add(b.wrapping_mul(2)) as usize)?;
            ctx.store(store, value)?
        }
        Loadb => {
            let value = ctx.machine.memory.read8(a.wrapping_add(b) as usize)?;
            ctx.store(store, value as u16)?
        }
        Storew => {
            need(ins, &ops, 3)?;
            ctx.machine.memory.write16(a.wrapping_add(b.wrapping_mul(2)) as usize, ops[2])?
        }
        Storeb => {
            need(ins, &ops, 3)?;
            ctx.machine.memory.write8(a.wrapping_add(b) as usize, ops[2] as u8)?
        }

        // calls and returns
        Call1s | Call2s | CallVs | CallVs2 | Call1n | Call2n | CallVn | CallVn2 => {
            need(ins, &ops, 1)?;
            ctx.call(a, &ops[1..], store)?
        }
        Ret => ctx.ret(a)?,
        Rtrue => ctx.ret(1)?,
        Rfalse => ctx.ret(0)?,
        RetPopped => {
            let value = ctx.pop()?;
            ctx.ret(value)?
        }
        Catch => {
            let cookie = ctx.catch();
            ctx.store(store, cookie)?
        }
        Throw => ctx.throw(a, b)?,
        CheckArgCount => {
            let supplied = ctx.arg_count() as u16;
            branch(ctx, ins, supplied >= a)?
        }

        // objects
        Jin => {
            let parent = ctx.machine.parent(a)?;
            branch(ctx, ins, parent == b)?
        }
        TestAttr => {
            let set = ctx.machine.test_attr(a, b)?;
            branch(ctx, ins, set)?
        }
        SetAttr => ctx.machine.set_attr(a, b, true)?,
        ClearAttr => ctx.machine.set_attr(a, b, false)?,
        InsertObj => ctx.machine.insert_obj(a, b)?,
        RemoveObj => ctx.machine.remove_obj(a)?,
        GetParent => {
            let parent = ctx.machine.parent(a)?;
            ctx.store(store, parent)?
        }
        GetSibling | GetChild => {
            let obj = if ins.opcode == GetSibling {
                ctx.machine.sibling(a)?
            } else {
                ctx.machine.child(a)?
            };
            ctx.store(store, obj)?;
            branch(ctx, ins, obj != 0)?
        }
        GetProp => {
            let value = ctx.machine.get_prop(a, b)?;
            ctx.store(store, value)?
        }
        GetPropAddr => {
            let addr = ctx.machine.get_prop_addr(a, b)?;
            ctx.store(store, addr)?
        }
        GetPropLen => {
            let len = ctx.machine.get_prop_len(a)?;
            ctx.store(store, len)?
        }
        GetNextProp => {
            let next = ctx.machine.get_next_prop(a, b)?;
            ctx.store(store, next)?
        }
        PutProp => {
            need(ins, &ops, 3)?;
            ctx.machine.put_prop(a, b, ops[2])?
        }

        // text output
        Print | PrintRet => {
            if let Some(addr) = ins.text {
                ctx.print_zstring(addr)?;
            }
            if ins.opcode == PrintRet {
                ctx.print("\n")?;
                ctx.ret(1)?;
            }
        }
        PrintAddr => {
            ctx.print_zstring(a as u32)?;
        }
        PrintPaddr => {
            let addr = ctx.machine.header.unpack(a);
            ctx.print_zstring(addr)?;
        }
        PrintObj => {
            if let Some(addr) = ctx.machine.short_name_addr(a)? {
                ctx.print_zstring(addr)?;
            }
        }
        PrintChar => ctx.print_zscii(a)?,
        PrintNum => ctx.print(&(a as i16).to_string())?,
        PrintUnicode => {
            let c = char::from_u32(a as u32).unwrap_or('?');
            ctx.print(c.encode_utf8(&mut [0u8; 4]))?
        }
        CheckUnicode => {
            let printable = char::from_u32(a as u32).is_some_and(|c| !c.is_control());
            ctx.store(store, if printable { 3 } else { 0 })?
        }
        NewLine => ctx.print("\n")?,
        PrintTable => {
            need(ins, &ops, 2)?;
            let height = if ops.len() > 2 { ops[2] } else { 1 };
            let skip = arg(&ops, 3);
            let mut addr = a as usize;
            for row in 0..height {
                if row > 0 {
                    ctx.print("\n")?;
                }
                let bytes = ctx.machine.memory.read_bytes(addr, b as usize)?.to_vec();
                let mut line = String::with_capacity(bytes.len());
                for &code in &bytes {
                    let c = ctx.text.zscii_to_char(&ctx.machine.memory, &ctx.machine.header, code as u16)?;
                    line.extend(c);
                }
                ctx.print(&line)?;
                addr += b as usize + skip as usize;
            }
        }

        // screen model
        SplitWindow => ctx.ui.split_window(a),
        SetWindow => ctx.ui.set_window(a),
        EraseWindow => ctx.ui.erase_window(a as i16),
        EraseLine => {
            if a == 1 {
                ctx.ui.erase_line();
            }
        }
        SetCursor => {
            if (a as i16) > 0 {
                ctx.ui.set_cursor(a, b);
            }
        }
        GetCursor => {
            let (row, col) = ctx.ui.cursor();
            ctx.machine.memory.write16(a as usize, row)?;
            ctx.machine.memory.write16(a as usize + 2, col)?;
        }
        SetTextStyle => ctx.ui.set_style(a),
        SetColour => ctx.ui.set_colour(a, b),
        SetFont => {
            let previous = match a {
                0 | 1 | 4 => 1,
                _ => 0,
            };
            ctx.store(store, previous)?
        }
        OutputStream => {
            let machine = &mut *ctx.machine;
            machine.streams.select(&mut machine.memory, a as i16, b as u32)?
        }
        BufferMode | InputStream | SoundEffect | Nop => {}

        // tables
        ScanTable => {
            need(ins, &ops, 3)?;
            let form = if ops.len() > 3 { ops[3] } else { 0x82 };
            let field = (form & 0x7F) as usize;
            let words = form & 0x80 != 0;
            let mut found = 0u16;
            for i in 0..ops[2] as usize {
                let addr = b as usize + i * field;
                let value = if words {
                    ctx.machine.memory.read16(addr)?
                } else {
                    ctx.machine.memory.read8(addr)? as u16
                };
                if value == a {
                    found = addr as u16;
                    break;
                }
            }
            ctx.store(store, found)?;
            branch(ctx, ins, found != 0)?
        }
        CopyTable => {
            need(ins, &ops, 3)?;
            let size = ops[2] as i16;
            let len = size.unsigned_abs() as usize;
            let memory = &mut ctx.machine.memory;
            if b == 0 {
                memory.write_bytes(a as usize, &vec![0u8; len])?;
            } else if size < 0 {
                // forward copy even when the tables overlap
                for i in 0..len {
                    let byte = memory.read8(a as usize + i)?;
                    memory.write8(b as usize + i, byte)?;
                }
            } else {
                let data = memory.read_bytes(a as usize, len)?.to_vec();
                memory.write_bytes(b as usize, &data)?;
            }
        }
        Random => {
            let range = a as i16;
            let value = if range > 0 {
                ctx.machine.state.random.next(range as u16)
            } else {
                ctx.machine.state.random.seed((range as i32).unsigned_abs() as u16);
                0
            };
            ctx.store(store, value)?
        }
        Verify => {
            let ok = ctx.machine.checksum() == ctx.machine.header.checksum;
            branch(ctx, ins, ok)?
        }
        Piracy => branch(ctx, ins, true)?,

        // input and dictionary
        Tokenise => {
            need(ins, &ops, 2)?;
            let dictionary = arg(&ops, 2) as u32;
            let skip_unknown = arg(&ops, 3) != 0;
            let machine = &mut *ctx.machine;
            ctx.text
                .tokenise(&mut machine.memory, &machine.header, a as u32, b as u32, dictionary, skip_unknown)?
        }
        EncodeText => {
            need(ins, &ops, 4)?;
            let machine = &mut *ctx.machine;
            let source = machine.memory.read_bytes(a as usize + ops[2] as usize, b as usize)?.to_vec();
            let encoded = ctx.text.encode_dictionary_word(&machine.memory, &machine.header, &source)?;
            machine.memory.write_bytes(ops[3] as usize, &encoded)?
        }
        Aread => {
            need(ins, &ops, 1)?;
            let len = ctx.machine.memory.read8(a as usize)?;
            ctx.request(Order::Read {
                buffer: a as u32,
                parse: b as u32,
                len,
                storer: store.unwrap_or(Variable::STACK),
                time: arg(&ops, 2),
                routine: arg(&ops, 3),
            });
        }
        ReadChar => ctx.request(Order::Char {
            storer: store.unwrap_or(Variable::STACK),
            time: arg(&ops, 1),
            routine: arg(&ops, 2),
        }),

        // persistence and lifecycle
        Save => {
            if !ops.is_empty() {
                // auxiliary table saves are not provided
                return ctx.store(store, 0);
            }
            let snapshot = Snapshot::capture(ctx.machine, store);
            let data = encode_snapshot(&snapshot, ctx.machine.story())?;
            ctx.request(Order::Save { data, storer: store });
        }
        Restore => {
            if !ops.is_empty() {
                return ctx.store(store, 0);
            }
            ctx.request(Order::Restore { storer: store });
        }
        SaveUndo => ctx.save_undo(store)?,
        RestoreUndo => ctx.restore_undo(store)?,
        Restart => ctx.request(Order::Restart),
        Quit => ctx.request(Order::Quit),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts() {
        assert_eq!(shift(1, 3, false), 8);
        assert_eq!(shift(0x8000, (-1i16) as u16, false), 0x4000);
        assert_eq!(shift(0x8000, (-1i16) as u16, true), 0xC000);
        assert_eq!(shift(0x8000, (-20i16) as u16, true), 0xFFFF);
        assert_eq!(shift(5, 16, false), 0);
    }
}
