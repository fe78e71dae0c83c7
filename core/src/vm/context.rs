use anyhow::{Result, bail};
use tracing::debug;

use crate::codegen::{Branch, BranchTarget};
use crate::config::EngineConfig;
use crate::host::{Order, Variable};
use crate::persist::{Snapshot, UndoHistory};
use crate::text::TextCodec;
use crate::ui::Ui;
use crate::vm::frame::{Frame, MAX_LOCALS};
use crate::vm::machine::Machine;

/// 单次运行循环中交给编译单元的执行上下文。
///
/// - 借用机器（内存、头部、栈）以及 UI、文本和撤销历史；
/// - 编译单元只能通过这里读写状态；
/// - `request` 记录需要交还给宿主的控制指令。
pub struct ExecContext<'a> {
    pub machine: &'a mut Machine,
    pub ui: &'a mut dyn Ui,
    pub text: &'a dyn TextCodec,
    pub undo: &'a mut UndoHistory,
    pub config: &'a EngineConfig,
    control: Option<Order>,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        machine: &'a mut Machine,
        ui: &'a mut dyn Ui,
        text: &'a dyn TextCodec,
        undo: &'a mut UndoHistory,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            machine,
            ui,
            text,
            undo,
            config,
            control: None,
        }
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.machine.state.pc
    }

    #[inline]
    pub fn jump(&mut self, addr: u32) {
        self.machine.state.pc = addr;
    }

    #[inline]
    pub fn read_var(&mut self, var: Variable) -> Result<u16> {
        self.machine.read_var(var)
    }

    #[inline]
    pub fn write_var(&mut self, var: Variable, value: u16) -> Result<()> {
        self.machine.write_var(var, value)
    }

    /// Store an instruction result; `None` discards it.
    #[inline]
    pub fn store(&mut self, storer: Option<Variable>, value: u16) -> Result<()> {
        match storer {
            Some(var) => self.machine.write_var(var, value),
            None => Ok(()),
        }
    }

    #[inline]
    pub fn push(&mut self, value: u16) -> Result<()> {
        self.machine.state.push(value)
    }

    #[inline]
    pub fn pop(&mut self) -> Result<u16> {
        self.machine.state.pop()
    }

    pub fn branch(&mut self, branch: &Branch, condition: bool) -> Result<()> {
        if condition != branch.on_true {
            return Ok(());
        }
        match branch.target {
            BranchTarget::ReturnFalse => self.ret(0),
            BranchTarget::ReturnTrue => self.ret(1),
            BranchTarget::Address(addr) => {
                self.jump(addr);
                Ok(())
            }
        }
    }

    /// Enter the routine at packed address `packed`. Calling address 0 does
    /// nothing except store false.
    pub fn call(&mut self, packed: u16, args: &[u16], storer: Option<Variable>) -> Result<()> {
        if packed == 0 {
            return self.store(storer, 0);
        }
        let addr = self.machine.header.unpack(packed);
        let count = self.machine.memory.read8(addr as usize)? as usize;
        if count > MAX_LOCALS {
            bail!("routine at 0x{:05x} declares {} locals", addr, count);
        }
        let mut locals = vec![0u16; count];
        for (slot, &arg) in locals.iter_mut().zip(args) {
            *slot = arg;
        }
        let frame = Frame::new(
            self.machine.state.pc,
            storer,
            locals,
            args.len() as u8,
            self.machine.state.stack().len(),
        );
        self.machine.state.push_frame(frame)?;
        self.jump(addr + 1);
        Ok(())
    }

    /// Return from the current routine with `value`.
    pub fn ret(&mut self, value: u16) -> Result<()> {
        let frame = self.machine.state.pop_frame()?;
        self.jump(frame.return_pc);
        self.store(frame.storer, value)
    }

    /// Stack frame cookie for `throw`.
    #[inline]
    pub fn catch(&self) -> u16 {
        self.machine.state.frames().len() as u16
    }

    /// Unwind to the routine that produced `cookie` and return `value` from it.
    pub fn throw(&mut self, value: u16, cookie: u16) -> Result<()> {
        let depth = self.machine.state.frames().len();
        let cookie = cookie as usize;
        if cookie == 0 || cookie > depth {
            bail!("throw to stale frame {} (depth {})", cookie, depth);
        }
        while self.machine.state.frames().len() > cookie {
            self.machine.state.pop_frame()?;
        }
        self.ret(value)
    }

    #[inline]
    pub fn arg_count(&self) -> u8 {
        self.machine.state.frame().map_or(0, |f| f.arg_count)
    }

    /// Send text to the active output stream.
    pub fn print(&mut self, text: &str) -> Result<()> {
        let machine = &mut *self.machine;
        if machine.streams.memory_active() {
            let zscii = self.text.encode(&machine.memory, &machine.header, text)?;
            return machine.streams.write_table(&mut machine.memory, &zscii);
        }
        if machine.streams.screen {
            self.ui.print(text);
        }
        Ok(())
    }

    pub fn print_zstring(&mut self, addr: u32) -> Result<u32> {
        let decoded = self.text.decode(&self.machine.memory, &self.machine.header, addr)?;
        self.print(&decoded.text)?;
        Ok(decoded.end)
    }

    pub fn print_zscii(&mut self, code: u16) -> Result<()> {
        let c = self.text.zscii_to_char(&self.machine.memory, &self.machine.header, code)?;
        match c {
            Some(c) => self.print(c.encode_utf8(&mut [0u8; 4])),
            None => Ok(()),
        }
    }

    /// Ask the engine to stop after this unit and hand `order` to the host.
    pub fn request(&mut self, order: Order) {
        debug!(target: "zvm::exec", order = order.code(), pc = self.pc(), "control requested");
        self.control = Some(order);
    }

    #[inline]
    pub fn has_control(&self) -> bool {
        self.control.is_some()
    }

    pub fn take_control(&mut self) -> Option<Order> {
        self.control.take()
    }

    pub fn save_undo(&mut self, storer: Option<Variable>) -> Result<()> {
        self.undo.push(Snapshot::capture(self.machine, storer));
        self.store(storer, 1)
    }

    /// Roll back to the newest checkpoint; stores 0 when there is none.
    pub fn restore_undo(&mut self, storer: Option<Variable>) -> Result<()> {
        let Some(snapshot) = self.undo.pop() else {
            return self.store(storer, 0);
        };
        let target = snapshot.storer;
        snapshot.apply(self.machine)?;
        self.machine.sync_header(self.config)?;
        self.store(target, 2)
    }
}
