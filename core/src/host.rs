//! Host handshake vocabulary.
//!
//! The host delivers one `Event` per `Engine::handle` call and receives the
//! ordered `Order`s produced while handling it. The last order is always a
//! control order telling the host why execution stopped. Both enums are
//! serde-tagged on `code` so they can cross a process boundary as JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EnvPatch;

/// Variable reference as encoded in a store byte: 0 is the stack top,
/// 1..=15 the current routine's locals, 16..=255 the globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(pub u8);

impl Variable {
    pub const STACK: Variable = Variable(0);

    #[inline]
    pub fn is_stack(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => write!(f, "sp"),
            n @ 1..=15 => write!(f, "L{:02}", n - 1),
            n => write!(f, "G{:02x}", n - 16),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResult {
    pub storer: Variable,
    pub value: u16,
}

/// A completed line of input, echoing the fields of the `read` order that requested it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub response: String,
    /// ZSCII code of the key that ended input (13 for enter).
    #[serde(default = "default_terminator")]
    pub terminator: u8,
    pub buffer: u32,
    #[serde(default)]
    pub parse: u32,
    pub len: u8,
    pub storer: Variable,
}

fn default_terminator() -> u8 {
    13
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyInput {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    /// Function key 1..=12.
    Function(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Event {
    Load {
        data: Vec<u8>,
    },
    Restart,
    Restore {
        #[serde(default)]
        data: Option<Vec<u8>>,
        #[serde(default)]
        storer: Option<Variable>,
    },
    Read(LineInput),
    Char {
        key: KeyInput,
        storer: Variable,
    },
    Resume {
        #[serde(default)]
        result: Option<StoreResult>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Load { .. } => "load",
            Event::Restart => "restart",
            Event::Restore { .. } => "restore",
            Event::Read(_) => "read",
            Event::Char { .. } => "char",
            Event::Resume { .. } => "resume",
        }
    }
}

/// An event as the host sends it, optionally carrying environment changes
/// that are merged before the event is handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub event: Event,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvPatch>,
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        Self { event, env: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamTarget {
    Main,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Order {
    Stream {
        to: StreamTarget,
        text: String,
        #[serde(default)]
        style: u16,
    },
    SplitWindow {
        lines: u16,
    },
    EraseWindow {
        window: i16,
    },
    SetCursor {
        row: u16,
        col: u16,
    },
    SetColour {
        foreground: u16,
        background: u16,
    },
    /// Execution budget exhausted; answer with `resume`.
    Tick,
    Read {
        buffer: u32,
        parse: u32,
        len: u8,
        storer: Variable,
        #[serde(default)]
        time: u16,
        #[serde(default)]
        routine: u16,
    },
    Char {
        storer: Variable,
        #[serde(default)]
        time: u16,
        #[serde(default)]
        routine: u16,
    },
    Save {
        data: Vec<u8>,
        storer: Option<Variable>,
    },
    Restore {
        storer: Option<Variable>,
    },
    Restart,
    Quit,
}

impl Order {
    /// Control orders end an order batch.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Order::Tick
                | Order::Read { .. }
                | Order::Char { .. }
                | Order::Save { .. }
                | Order::Restore { .. }
                | Order::Restart
                | Order::Quit
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Order::Stream { .. } => "stream",
            Order::SplitWindow { .. } => "split_window",
            Order::EraseWindow { .. } => "erase_window",
            Order::SetCursor { .. } => "set_cursor",
            Order::SetColour { .. } => "set_colour",
            Order::Tick => "tick",
            Order::Read { .. } => "read",
            Order::Char { .. } => "char",
            Order::Save { .. } => "save",
            Order::Restore { .. } => "restore",
            Order::Restart => "restart",
            Order::Quit => "quit",
        }
    }
}
