use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::VmError;
use crate::vm::frame::Frame;
use crate::vm::random::RandomState;

pub const MAX_STACK: usize = 0xFFFF;
pub const MAX_FRAMES: usize = 1024;

/// Registers and stacks of the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmState {
    pub pc: u32,
    stack: Vec<u16>,
    frames: Vec<Frame>,
    pub random: RandomState,
}

/// The persisted part of `VmState` (everything but the random generator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub stack: Vec<u16>,
    pub frames: Vec<Frame>,
}

impl VmState {
    pub fn new(pc: u32) -> Self {
        Self {
            pc,
            ..Self::default()
        }
    }

    #[inline]
    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[inline]
    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    #[inline]
    fn stack_floor(&self) -> usize {
        self.frames.last().map_or(0, |f| f.stack_base)
    }

    #[inline]
    pub fn push(&mut self, value: u16) -> Result<()> {
        if self.stack.len() >= MAX_STACK {
            return Err(VmError::StackOverflow.into());
        }
        self.stack.push(value);
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self) -> Result<u16> {
        if self.stack.len() <= self.stack_floor() {
            return Err(VmError::StackUnderflow.into());
        }
        self.stack.pop().ok_or_else(|| VmError::StackUnderflow.into())
    }

    #[inline]
    pub fn peek(&self) -> Result<u16> {
        if self.stack.len() <= self.stack_floor() {
            return Err(VmError::StackUnderflow.into());
        }
        self.stack.last().copied().ok_or_else(|| VmError::StackUnderflow.into())
    }

    pub fn replace_top(&mut self, value: u16) -> Result<()> {
        if self.stack.len() <= self.stack_floor() {
            return Err(VmError::StackUnderflow.into());
        }
        if let Some(top) = self.stack.last_mut() {
            *top = value;
        }
        Ok(())
    }

    pub fn local(&self, index: u8) -> Result<u16> {
        let frame = self.frames.last().ok_or(VmError::NoFrame)?;
        frame
            .locals
            .get(index as usize)
            .copied()
            .ok_or_else(|| VmError::BadVariable(index + 1).into())
    }

    pub fn set_local(&mut self, index: u8, value: u16) -> Result<()> {
        let frame = self.frames.last_mut().ok_or(VmError::NoFrame)?;
        let slot = frame
            .locals
            .get_mut(index as usize)
            .ok_or(VmError::BadVariable(index + 1))?;
        *slot = value;
        Ok(())
    }

    pub fn push_frame(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::FrameOverflow.into());
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pop the current routine, discarding whatever it left on the value stack.
    pub fn pop_frame(&mut self) -> Result<Frame> {
        let frame = self.frames.pop().ok_or(VmError::NoFrame)?;
        self.stack.truncate(frame.stack_base);
        Ok(frame)
    }

    pub fn snapshot(&self) -> StackSnapshot {
        StackSnapshot {
            stack: self.stack.clone(),
            frames: self.frames.clone(),
        }
    }

    pub fn restore(&mut self, pc: u32, snapshot: StackSnapshot) {
        self.pc = pc;
        self.stack = snapshot.stack;
        self.frames = snapshot.frames;
    }
}
