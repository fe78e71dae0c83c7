use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::memory::Memory;

/// Nesting limit for output stream 3.
pub const MAX_MEMORY_STREAMS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TableStream {
    addr: u32,
    written: u16,
}

/// Selected output streams. Stream 1 is the screen; stream 3 redirects all
/// text into a table in memory, suppressing every other stream while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputStreams {
    pub screen: bool,
    tables: Vec<TableStream>,
}

impl Default for OutputStreams {
    fn default() -> Self {
        Self {
            screen: true,
            tables: Vec::new(),
        }
    }
}

impl OutputStreams {
    #[inline]
    pub fn memory_active(&self) -> bool {
        !self.tables.is_empty()
    }

    /// Handle `output_stream`. Transcript (2) and command (4) streams are not
    /// provided and are ignored.
    pub fn select(&mut self, memory: &mut Memory, stream: i16, table: u32) -> Result<()> {
        match stream {
            0 => {}
            1 => self.screen = true,
            -1 => self.screen = false,
            3 => {
                if self.tables.len() >= MAX_MEMORY_STREAMS {
                    bail!("output stream 3 nested more than {} deep", MAX_MEMORY_STREAMS);
                }
                memory.write16(table as usize, 0)?;
                self.tables.push(TableStream { addr: table, written: 0 });
            }
            -3 => {
                if let Some(done) = self.tables.pop() {
                    memory.write16(done.addr as usize, done.written)?;
                }
            }
            other => debug!(target: "zvm::streams", stream = other, "ignoring unsupported output stream"),
        }
        Ok(())
    }

    /// Append ZSCII to the innermost memory stream.
    pub fn write_table(&mut self, memory: &mut Memory, zscii: &[u8]) -> Result<()> {
        let Some(table) = self.tables.last_mut() else {
            return Ok(());
        };
        let at = table.addr as usize + 2 + table.written as usize;
        memory.write_bytes(at, zscii)?;
        table.written = table.written.wrapping_add(zscii.len() as u16);
        memory.write16(table.addr as usize, table.written)?;
        Ok(())
    }
}
