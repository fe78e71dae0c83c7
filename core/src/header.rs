//! Story header: fixed-offset layout fields and the capability flags the
//! engine writes back after every restart or restore.

use anyhow::Result;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::VmError;
use crate::memory::Memory;

pub mod offsets {
    pub const VERSION: usize = 0x00;
    pub const FLAGS1: usize = 0x01;
    pub const RELEASE: usize = 0x02;
    pub const HIGH_MEMORY: usize = 0x04;
    pub const INITIAL_PC: usize = 0x06;
    pub const DICTIONARY: usize = 0x08;
    pub const PROPERTY_DEFAULTS: usize = 0x0A;
    pub const GLOBALS: usize = 0x0C;
    pub const STATIC_MEMORY: usize = 0x0E;
    /// Low byte of the flags 2 word; the only part the engine owns.
    pub const FLAGS2: usize = 0x11;
    pub const SERIAL: usize = 0x12;
    pub const ABBREVIATIONS: usize = 0x18;
    pub const FILE_LENGTH: usize = 0x1A;
    pub const CHECKSUM: usize = 0x1C;
    pub const SCREEN_HEIGHT: usize = 0x20;
    pub const SCREEN_WIDTH: usize = 0x21;
    pub const SCREEN_WIDTH_UNITS: usize = 0x22;
    pub const SCREEN_HEIGHT_UNITS: usize = 0x24;
    pub const FONT_METRICS: usize = 0x26;
    pub const TERMINATING_CHARS: usize = 0x2E;
    pub const STANDARD_REVISION: usize = 0x32;
    pub const ALPHABET_TABLE: usize = 0x34;
    pub const EXTENSION: usize = 0x36;
}

pub const HEADER_SIZE: usize = 0x40;
pub const SUPPORTED_VERSIONS: [u8; 2] = [5, 8];

/// Object entries start 126 bytes (63 default words) after the defaults table;
/// the base is pre-shifted by one 14-byte entry so object N lives at `objects + 14 * N`.
pub const OBJECT_TABLE_OFFSET: u32 = 112;

/// Flags 1: colours, bold, italic, fixed-pitch.
const FLAGS1_STYLES: u8 = 0x1D;
const FLAGS1_TIMED_INPUT: u8 = 0x80;
/// Flags 2 bits kept as the story set them; 3 (pictures), 5 (mouse) and 7 (sound) are cleared.
const FLAGS2_KEEP_MASK: u8 = 0x57;
const INFINITE_HEIGHT: u8 = 255;
const FONT_UNITS: u16 = 0x0101;
const EXT_FLAGS3: u16 = 4;
pub const EXT_UNICODE_TABLE: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub version: u8,
    pub release: u16,
    pub serial: [u8; 6],
    pub checksum: u16,
    pub file_length: u32,
    pub high_memory: u16,
    pub initial_pc: u32,
    pub dictionary: u32,
    pub property_defaults: u32,
    pub objects: u32,
    pub globals: u32,
    pub static_memory: u32,
    pub abbreviations: u32,
    pub alphabet_table: u32,
    pub terminating_chars: u32,
    pub extension: u32,
    pub extension_count: u16,
    pub packing_multiplier: u32,
}

impl Header {
    /// Derive every header field from the image. Fails with `UnsupportedVersion`
    /// before anything else is read.
    pub fn parse(memory: &Memory) -> Result<Header> {
        let version = memory.read8(offsets::VERSION)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(VmError::UnsupportedVersion(version).into());
        }
        if memory.len() < HEADER_SIZE {
            memory.read8(HEADER_SIZE - 1)?;
        }
        let property_defaults = memory.read16(offsets::PROPERTY_DEFAULTS)? as u32;
        let extension = memory.read16(offsets::EXTENSION)? as u32;
        let extension_count = if extension != 0 {
            memory.read16(extension as usize)?
        } else {
            0
        };
        let packing_multiplier = if version == 5 { 4 } else { 8 };
        let mut serial = [0u8; 6];
        serial.copy_from_slice(memory.read_bytes(offsets::SERIAL, 6)?);
        let file_length = memory.read16(offsets::FILE_LENGTH)? as u32 * packing_multiplier;

        Ok(Header {
            version,
            release: memory.read16(offsets::RELEASE)?,
            serial,
            checksum: memory.read16(offsets::CHECKSUM)?,
            file_length,
            high_memory: memory.read16(offsets::HIGH_MEMORY)?,
            initial_pc: memory.read16(offsets::INITIAL_PC)? as u32,
            dictionary: memory.read16(offsets::DICTIONARY)? as u32,
            property_defaults,
            objects: property_defaults + OBJECT_TABLE_OFFSET,
            globals: memory.read16(offsets::GLOBALS)? as u32,
            static_memory: memory.read16(offsets::STATIC_MEMORY)? as u32,
            abbreviations: memory.read16(offsets::ABBREVIATIONS)? as u32,
            alphabet_table: memory.read16(offsets::ALPHABET_TABLE)? as u32,
            terminating_chars: memory.read16(offsets::TERMINATING_CHARS)? as u32,
            extension,
            extension_count,
            packing_multiplier,
        })
    }

    /// Convert a packed routine or string address to a byte address.
    #[inline]
    pub fn unpack(&self, packed: u16) -> u32 {
        packed as u32 * self.packing_multiplier
    }

    pub fn extension_word(&self, memory: &Memory, index: u16) -> Result<Option<u16>> {
        if self.extension == 0 || self.extension_count < index {
            return Ok(None);
        }
        Ok(Some(memory.read16(self.extension as usize + 2 * index as usize)?))
    }

    /// Writes are dropped when the story has no extension table or a shorter one.
    pub fn set_extension_word(&self, memory: &mut Memory, index: u16, value: u16) -> Result<bool> {
        if self.extension == 0 || self.extension_count < index {
            return Ok(false);
        }
        memory.write16(self.extension as usize + 2 * index as usize, value)?;
        Ok(true)
    }
}

/// Carry the flags 2 low byte from the previous image into a freshly loaded one.
pub fn carry_flags2(previous: &Memory, next: &mut Memory) -> Result<()> {
    let flags2 = previous.read8(offsets::FLAGS2)?;
    next.write8(offsets::FLAGS2, flags2)?;
    Ok(())
}

/// Write the interpreter capability and display fields into the header.
pub fn write_capabilities(memory: &mut Memory, header: &Header, config: &EngineConfig) -> Result<()> {
    let flags1 = FLAGS1_STYLES | if config.timed { FLAGS1_TIMED_INPUT } else { 0 };
    memory.write8(offsets::FLAGS1, flags1)?;
    let flags2 = memory.read8(offsets::FLAGS2)?;
    memory.write8(offsets::FLAGS2, flags2 & FLAGS2_KEEP_MASK)?;

    memory.write8(offsets::SCREEN_HEIGHT, INFINITE_HEIGHT)?;
    memory.write8(offsets::SCREEN_WIDTH, config.width)?;
    memory.write16(offsets::SCREEN_WIDTH_UNITS, config.width as u16)?;
    memory.write16(offsets::SCREEN_HEIGHT_UNITS, INFINITE_HEIGHT as u16)?;
    memory.write16(offsets::FONT_METRICS, FONT_UNITS)?;

    // 1.2 is only claimed when the host explicitly opts in; 1.1 is never advertised.
    memory.write8(offsets::STANDARD_REVISION, 1)?;
    memory.write8(offsets::STANDARD_REVISION + 1, if config.security_override { 2 } else { 0 })?;

    header.set_extension_word(memory, EXT_FLAGS3, 0)?;
    Ok(())
}
