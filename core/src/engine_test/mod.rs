pub(super) use crate::{
    codegen::{CodeGenerator, CompiledUnit, ZCodeGenerator},
    config::{EngineConfig, EnvPatch},
    error::VmError,
    header::{Header, offsets},
    host::{Envelope, Event, KeyInput, LineInput, Order, StoreResult, StreamTarget, Variable},
    memory::Memory,
    text::ZsciiText,
    ui::BufferedUi,
    vm::Engine,
};

pub(super) const CODE: usize = 0x500;
pub(super) const GLOBALS: usize = 0x40;
pub(super) const TEXT_BUFFER: u32 = 0x2C0;
pub(super) const PARSE_BUFFER: u32 = 0x310;
const PROPERTY_DEFAULTS: usize = 0x220;
const DICTIONARY: usize = 0x2A0;
const STATIC_MEMORY: usize = 0x400;
const STORY_SIZE: usize = 0x800;

/// Minimal version 5 story: globals, an empty dictionary, text and parse
/// buffers in dynamic memory, and code starting at `CODE` in static memory.
pub(super) struct StoryBuilder {
    bytes: Vec<u8>,
    code_at: usize,
}

fn put16(bytes: &mut [u8], at: usize, value: u16) {
    bytes[at..at + 2].copy_from_slice(&value.to_be_bytes());
}

impl StoryBuilder {
    pub(super) fn new() -> Self {
        let mut bytes = vec![0u8; STORY_SIZE];
        bytes[offsets::VERSION] = 5;
        put16(&mut bytes, offsets::RELEASE, 1);
        bytes[offsets::SERIAL..offsets::SERIAL + 6].copy_from_slice(b"251019");
        put16(&mut bytes, offsets::INITIAL_PC, CODE as u16);
        put16(&mut bytes, offsets::GLOBALS, GLOBALS as u16);
        put16(&mut bytes, offsets::PROPERTY_DEFAULTS, PROPERTY_DEFAULTS as u16);
        put16(&mut bytes, offsets::DICTIONARY, DICTIONARY as u16);
        put16(&mut bytes, offsets::STATIC_MEMORY, STATIC_MEMORY as u16);
        put16(&mut bytes, offsets::FILE_LENGTH, (STORY_SIZE / 4) as u16);
        // no separators, 7-byte entries, no words
        bytes[DICTIONARY + 1] = 7;
        bytes[TEXT_BUFFER as usize] = 40;
        bytes[PARSE_BUFFER as usize] = 8;
        Self { bytes, code_at: CODE }
    }

    pub(super) fn version(mut self, version: u8) -> Self {
        self.bytes[offsets::VERSION] = version;
        self
    }

    pub(super) fn release(mut self, release: u16) -> Self {
        put16(&mut self.bytes, offsets::RELEASE, release);
        self
    }

    pub(super) fn flags2(mut self, flags: u8) -> Self {
        self.bytes[offsets::FLAGS2] = flags;
        self
    }

    pub(super) fn global(mut self, n: u8, value: u16) -> Self {
        put16(&mut self.bytes, GLOBALS + 2 * n as usize, value);
        self
    }

    /// Append instructions after the ones already written.
    pub(super) fn code(mut self, code: &[u8]) -> Self {
        self.bytes[self.code_at..self.code_at + code.len()].copy_from_slice(code);
        self.code_at += code.len();
        self
    }

    pub(super) fn routine(mut self, addr: usize, locals: u8, body: &[u8]) -> Self {
        self.bytes[addr] = locals;
        self.bytes[addr + 1..addr + 1 + body.len()].copy_from_slice(body);
        self
    }

    pub(super) fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encode lowercase text (and spaces) as a z-string.
pub(super) fn zstr(text: &str) -> Vec<u8> {
    let mut zchars: Vec<u8> = text
        .bytes()
        .map(|c| if c == b' ' { 0 } else { c - b'a' + 6 })
        .collect();
    while zchars.is_empty() || zchars.len() % 3 != 0 {
        zchars.push(5);
    }
    let words = zchars.len() / 3;
    let mut out = Vec::new();
    for (i, c) in zchars.chunks(3).enumerate() {
        let mut w = ((c[0] as u16) << 10) | ((c[1] as u16) << 5) | c[2] as u16;
        if i + 1 == words {
            w |= 0x8000;
        }
        out.extend_from_slice(&w.to_be_bytes());
    }
    out
}

pub(super) fn global(n: u8) -> Variable {
    Variable(0x10 + n)
}

pub(super) fn loaded(story: Vec<u8>, config: EngineConfig) -> Engine {
    let mut engine = Engine::new(config);
    let orders = engine.handle(Event::Load { data: story }).unwrap();
    assert!(orders.is_empty());
    engine
}

pub(super) fn started(story: Vec<u8>) -> (Engine, Vec<Order>) {
    let mut engine = loaded(story, EngineConfig::default());
    let orders = engine.handle(Event::Restart).unwrap();
    (engine, orders)
}

pub(super) fn read_global(engine: &Engine, n: u8) -> u16 {
    engine
        .machine()
        .unwrap()
        .memory
        .read16(GLOBALS + 2 * n as usize)
        .unwrap()
}

pub(super) fn main_text(orders: &[Order]) -> String {
    orders
        .iter()
        .filter_map(|o| match o {
            Order::Stream {
                to: StreamTarget::Main,
                text,
                ..
            } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

// Hand-assembled instructions shared by the scenarios.
pub(super) const QUIT: u8 = 0xBA;
pub(super) const NEW_LINE: u8 = 0xBB;
/// `read_char 1 -> G03`
pub(super) const READ_CHAR: [u8; 4] = [0xF6, 0x7F, 0x01, 0x13];
/// `inc G01`
pub(super) const INC_G01: [u8; 2] = [0x95, 0x11];
/// `jump -3`: back to the 2-byte instruction in front of the jump.
pub(super) const JUMP_BACK_2: [u8; 3] = [0x8C, 0xFF, 0xFD];
/// `aread TEXT_BUFFER PARSE_BUFFER -> G00`
pub(super) const AREAD: [u8; 7] = [0xE4, 0x0F, 0x02, 0xC0, 0x03, 0x10, 0x10];

mod execution;
mod input;
mod lifecycle;
mod persistence;
