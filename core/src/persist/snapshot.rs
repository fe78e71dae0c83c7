use anyhow::{Result, ensure};

use crate::header::Header;
use crate::host::Variable;
use crate::memory::Memory;
use crate::vm::{Machine, OutputStreams, StackSnapshot};

/// Everything needed to resume execution at a save point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub release: u16,
    pub serial: [u8; 6],
    pub checksum: u16,
    /// Address execution resumes at: the instruction after the save.
    pub pc: u32,
    /// Where the save instruction stores its result; receives 2 on restore.
    pub storer: Option<Variable>,
    pub memory: Vec<u8>,
    pub stacks: StackSnapshot,
    /// Screen toggle and open stream 3 tables.
    pub streams: OutputStreams,
}

impl Snapshot {
    pub fn capture(machine: &Machine, storer: Option<Variable>) -> Snapshot {
        let header = &machine.header;
        Snapshot {
            release: header.release,
            serial: header.serial,
            checksum: header.checksum,
            pc: machine.state.pc,
            storer,
            memory: machine.memory.as_slice().to_vec(),
            stacks: machine.state.snapshot(),
            streams: machine.streams.clone(),
        }
    }

    /// Whether the snapshot was taken from the story described by `header`.
    pub fn matches(&self, header: &Header) -> bool {
        self.release == header.release && self.serial == header.serial && self.checksum == header.checksum
    }

    /// Replace memory, stacks, output streams and pc. Header fields are left as they are; the
    /// caller re-synchronises the capability bytes afterwards.
    pub fn apply(self, machine: &mut Machine) -> Result<()> {
        ensure!(self.matches(&machine.header), "snapshot belongs to a different story");
        ensure!(
            self.memory.len() == machine.memory.len(),
            "snapshot memory is {} bytes, story has {}",
            self.memory.len(),
            machine.memory.len()
        );
        machine.memory = Memory::new(self.memory);
        machine.state.restore(self.pc, self.stacks);
        machine.streams = self.streams;
        Ok(())
    }
}
