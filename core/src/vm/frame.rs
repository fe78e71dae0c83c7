use serde::{Deserialize, Serialize};

use crate::host::Variable;

pub const MAX_LOCALS: usize = 15;

/// One active routine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Address execution continues at when the routine returns.
    pub return_pc: u32,
    /// Where the return value goes; `None` for `call_*n` forms.
    pub storer: Option<Variable>,
    pub locals: Vec<u16>,
    /// Number of arguments actually supplied by the caller.
    pub arg_count: u8,
    /// Value stack height when the routine was entered.
    pub stack_base: usize,
}

impl Frame {
    pub fn new(return_pc: u32, storer: Option<Variable>, locals: Vec<u16>, arg_count: u8, stack_base: usize) -> Self {
        debug_assert!(locals.len() <= MAX_LOCALS);
        Self {
            return_pc,
            storer,
            locals,
            arg_count,
            stack_base,
        }
    }
}
