use std::fmt;

/// Out-of-range access against the memory image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryError {
    pub addr: usize,
    pub len: usize,
    pub size: usize,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory access out of range: {} byte(s) at 0x{:05x} (image size 0x{:05x})",
            self.len, self.addr, self.size
        )
    }
}

impl std::error::Error for MemoryError {}

/// Failure kinds raised by the engine. They travel inside `anyhow::Error`
/// and can be recovered with `downcast_ref::<VmError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    UnsupportedVersion(u8),
    NoStory,
    NotStarted,
    Halted,
    Compile { addr: u32, reason: String },
    StackOverflow,
    StackUnderflow,
    FrameOverflow,
    NoFrame,
    DivisionByZero { addr: u32 },
    BadVariable(u8),
}

impl VmError {
    pub fn compile<S: Into<String>>(addr: u32, reason: S) -> Self {
        VmError::Compile {
            addr,
            reason: reason.into(),
        }
    }

    /// Errors raised while the header is being (re)built; nothing was committed.
    pub fn is_initialization(&self) -> bool {
        matches!(self, VmError::UnsupportedVersion(_) | VmError::NoStory)
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::UnsupportedVersion(v) => write!(f, "unsupported Z-machine version: {}", v),
            VmError::NoStory => write!(f, "no story file has been loaded"),
            VmError::NotStarted => write!(f, "the machine has not been started"),
            VmError::Halted => write!(f, "the machine has halted"),
            VmError::Compile { addr, reason } => write!(f, "cannot compile code at 0x{:05x}: {}", addr, reason),
            VmError::StackOverflow => write!(f, "value stack overflow"),
            VmError::StackUnderflow => write!(f, "value stack underflow"),
            VmError::FrameOverflow => write!(f, "call stack overflow"),
            VmError::NoFrame => write!(f, "return or local access with no active routine"),
            VmError::DivisionByZero { addr } => write!(f, "division by zero at 0x{:05x}", addr),
            VmError::BadVariable(v) => write!(f, "reference to missing local variable {}", v),
        }
    }
}

impl std::error::Error for VmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_mentions_address() {
        let err = VmError::compile(0x1234, "unknown opcode 0xee");
        assert_eq!(err.to_string(), "cannot compile code at 0x01234: unknown opcode 0xee");
    }

    #[test]
    fn downcast_through_anyhow() {
        let err: anyhow::Error = VmError::UnsupportedVersion(3).into();
        let kind = err.downcast_ref::<VmError>().expect("typed error");
        assert!(kind.is_initialization());
    }
}
