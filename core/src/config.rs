use serde::{Deserialize, Serialize};

pub const DEFAULT_WIDTH: u8 = 80;
pub const DEFAULT_UNDO_DEPTH: usize = 8;
pub const DEFAULT_TIME_SLICE_MS: u64 = 5000;

/// Host environment the engine advertises through the story header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reported screen width in characters.
    pub width: u8,
    /// Advertise timed input support (flags 1, bit 7).
    pub timed: bool,
    /// Advertise standard revision 1.2 instead of 1.0.
    pub security_override: bool,
    /// Number of in-memory undo checkpoints kept.
    pub undo_depth: usize,
    /// Continuous execution budget before yielding a `tick` order.
    pub time_slice_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            timed: false,
            security_override: false,
            undo_depth: DEFAULT_UNDO_DEPTH,
            time_slice_ms: DEFAULT_TIME_SLICE_MS,
        }
    }
}

impl EngineConfig {
    pub fn apply(&mut self, patch: &EnvPatch) {
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(timed) = patch.timed {
            self.timed = timed;
        }
        if let Some(flag) = patch.security_override {
            self.security_override = flag;
        }
        if let Some(depth) = patch.undo_depth {
            self.undo_depth = depth.max(1);
        }
        if let Some(ms) = patch.time_slice_ms {
            self.time_slice_ms = ms;
        }
    }

    pub fn with(mut self, patch: &EnvPatch) -> Self {
        self.apply(patch);
        self
    }
}

/// Partial environment update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvPatch {
    pub width: Option<u8>,
    pub timed: Option<bool>,
    pub security_override: Option<bool>,
    pub undo_depth: Option<usize>,
    pub time_slice_ms: Option<u64>,
}
