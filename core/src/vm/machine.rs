use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::config::EngineConfig;
use crate::header::{self, Header};
use crate::host::Variable;
use crate::memory::Memory;
use crate::vm::state::VmState;
use crate::vm::streams::OutputStreams;

/// Everything that is rebuilt by a restart: the live memory image, the
/// header derived from it and the registers and stacks.
#[derive(Debug, Clone)]
pub struct Machine {
    pub memory: Memory,
    pub header: Header,
    pub state: VmState,
    pub streams: OutputStreams,
    story: Arc<[u8]>,
    pub(crate) halted: bool,
}

impl Machine {
    /// Build a fresh machine from the pristine story bytes. The header is parsed
    /// before anything is committed, so an unsupported version leaves the
    /// caller's previous machine untouched.
    pub fn new(story: Arc<[u8]>, previous: Option<&Memory>) -> Result<Machine> {
        let mut memory = Memory::from_slice(&story);
        let header = Header::parse(&memory)?;
        if let Some(prev) = previous {
            header::carry_flags2(prev, &mut memory)?;
        }
        debug!(
            target: "zvm::machine",
            version = header.version,
            release = header.release,
            pc = header.initial_pc,
            "machine initialised"
        );
        Ok(Machine {
            state: VmState::new(header.initial_pc),
            memory,
            header,
            streams: OutputStreams::default(),
            story,
            halted: false,
        })
    }

    /// Pristine bytes of the loaded story.
    #[inline]
    pub fn story(&self) -> &[u8] {
        &self.story
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Reset the random generator and rewrite the capability fields.
    /// Runs after every restart and every restore.
    pub fn sync_header(&mut self, config: &EngineConfig) -> Result<()> {
        self.state.random.reset();
        header::write_capabilities(&mut self.memory, &self.header, config)
    }

    #[inline]
    fn global_addr(&self, var: Variable) -> usize {
        self.header.globals as usize + 2 * (var.0 as usize - 16)
    }

    pub fn read_var(&mut self, var: Variable) -> Result<u16> {
        match var.0 {
            0 => self.state.pop(),
            n @ 1..=15 => self.state.local(n - 1),
            _ => Ok(self.memory.read16(self.global_addr(var))?),
        }
    }

    pub fn write_var(&mut self, var: Variable, value: u16) -> Result<()> {
        match var.0 {
            0 => self.state.push(value),
            n @ 1..=15 => self.state.set_local(n - 1, value),
            _ => {
                let addr = self.global_addr(var);
                Ok(self.memory.write16(addr, value)?)
            }
        }
    }

    /// Read for opcodes that name their variable by number: the stack is
    /// peeked rather than popped.
    pub fn read_var_indirect(&mut self, var: Variable) -> Result<u16> {
        if var.is_stack() {
            return self.state.peek();
        }
        self.read_var(var)
    }

    /// Write counterpart of `read_var_indirect`: the stack top is replaced.
    pub fn write_var_indirect(&mut self, var: Variable, value: u16) -> Result<()> {
        if var.is_stack() {
            return self.state.replace_top(value);
        }
        self.write_var(var, value)
    }

    /// Sum of the story bytes after the header, compared by `verify`.
    pub fn checksum(&self) -> u16 {
        let end = (self.header.file_length as usize).min(self.story.len());
        self.story
            .get(header::HEADER_SIZE..end)
            .unwrap_or(&[])
            .iter()
            .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
    }
}
