use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::codegen::{CodeGenerator, ZCodeGenerator};
use crate::config::{EngineConfig, EnvPatch};
use crate::error::VmError;
use crate::host::{Envelope, Event, KeyInput, LineInput, Order, StoreResult, StreamTarget, Variable};
use crate::persist::{UndoHistory, decode_snapshot};
use crate::text::{TextCodec, ZsciiText};
use crate::ui::{BufferedUi, Ui};
use crate::vm::cache::{CacheStats, TranslationCache};
use crate::vm::context::ExecContext;
use crate::vm::machine::Machine;

/// Value a restored `save` (or `restore_undo`) stores into its result variable.
pub const RESTORED: u16 = 2;

/// The execution engine: owns the machine, the translation cache and the
/// undo history, and drives the run loop one host event at a time.
pub struct Engine {
    config: EngineConfig,
    story: Option<Arc<[u8]>>,
    machine: Option<Machine>,
    cache: TranslationCache,
    undo: UndoHistory,
    generator: Box<dyn CodeGenerator>,
    text: Box<dyn TextCodec>,
    ui: Box<dyn Ui>,
    orders: Vec<Order>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_collaborators(
            config,
            Box::new(ZCodeGenerator),
            Box::new(ZsciiText),
            Box::new(BufferedUi::new()),
        )
    }

    pub fn with_collaborators(
        config: EngineConfig,
        generator: Box<dyn CodeGenerator>,
        text: Box<dyn TextCodec>,
        ui: Box<dyn Ui>,
    ) -> Self {
        Self {
            undo: UndoHistory::new(config.undo_depth),
            config,
            story: None,
            machine: None,
            cache: TranslationCache::new(),
            generator,
            text,
            ui,
            orders: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Merge host environment settings; header fields pick them up at the
    /// next restart or restore.
    pub fn update_env(&mut self, patch: &EnvPatch) {
        self.config.apply(patch);
        self.undo.set_depth(self.config.undo_depth);
    }

    #[inline]
    pub fn machine(&self) -> Option<&Machine> {
        self.machine.as_ref()
    }

    #[inline]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    #[inline]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Handle one host event and return the orders it produced. Every batch
    /// that ran the program ends with exactly one control order.
    pub fn handle(&mut self, event: impl Into<Envelope>) -> Result<Vec<Order>> {
        let Envelope { event, env } = event.into();
        self.orders.clear();
        // output left behind by a failed batch is never delivered
        self.ui.flush();
        self.ui.take_status();
        if let Some(patch) = env {
            self.update_env(&patch);
        }
        debug!(target: "zvm::engine", event = event.name(), "handling event");
        match event {
            Event::Load { data } => {
                self.load(data);
                return Ok(Vec::new());
            }
            Event::Restart => self.restart()?,
            Event::Restore { data, storer } => self.restore(data, storer)?,
            Event::Read(input) => self.line_input(input)?,
            Event::Char { key, storer } => self.char_input(key, storer)?,
            Event::Resume { result } => self.resume(result)?,
        }
        if let Err(err) = self.run() {
            self.halt();
            return Err(err);
        }
        Ok(std::mem::take(&mut self.orders))
    }

    /// Stop after a fatal error: only load and restart are accepted afterwards.
    fn halt(&mut self) {
        if let Some(machine) = self.machine.as_mut() {
            machine.halted = true;
        }
        self.ui.reset();
        self.orders.clear();
    }

    fn load(&mut self, data: Vec<u8>) {
        let same = self.story.as_deref() == Some(data.as_slice());
        if !same && !self.cache.is_empty() {
            debug!(target: "zvm::engine", entries = self.cache.len(), "new story image, dropping compiled units");
            self.cache.clear();
        }
        self.story = Some(data.into());
    }

    fn restart(&mut self) -> Result<()> {
        let story = self.story.clone().ok_or(VmError::NoStory)?;
        let machine = Machine::new(story, self.machine.as_ref().map(|m| &m.memory))?;
        self.machine = Some(machine);
        self.undo.clear();
        self.ui.reset();
        self.update_header()
    }

    fn update_header(&mut self) -> Result<()> {
        let machine = self.machine.as_mut().ok_or(VmError::NotStarted)?;
        machine.sync_header(&self.config)
    }

    /// The machine an input-bearing event applies to.
    fn running(&mut self) -> Result<&mut Machine> {
        let machine = self.machine.as_mut().ok_or(VmError::NotStarted)?;
        if machine.halted {
            return Err(VmError::Halted.into());
        }
        Ok(machine)
    }

    fn restore(&mut self, data: Option<Vec<u8>>, storer: Option<Variable>) -> Result<()> {
        let machine = self.running()?;
        let Some(data) = data else {
            return store(machine, storer, 0);
        };
        let restored = decode_snapshot(&data, machine.story()).and_then(|snapshot| {
            let target = snapshot.storer;
            snapshot.apply(machine)?;
            Ok(target)
        });
        match restored {
            Ok(target) => {
                self.update_header()?;
                let machine = self.running()?;
                store(machine, target, RESTORED)
            }
            Err(err) => {
                warn!(target: "zvm::persist", error = %err, "rejecting save data");
                store(machine, storer, 0)
            }
        }
    }

    fn line_input(&mut self, input: LineInput) -> Result<()> {
        let machine = self.machine.as_mut().ok_or(VmError::NotStarted)?;
        if machine.halted {
            return Err(VmError::Halted.into());
        }
        machine.write_var(input.storer, input.terminator as u16)?;
        self.ui.print(&input.response);
        self.ui.print("\n");

        let lowered = input.response.to_lowercase();
        let mut zscii = self.text.encode(&machine.memory, &machine.header, &lowered)?;
        if zscii.len() > input.len as usize {
            warn!(
                target: "zvm::engine",
                got = zscii.len(),
                max = input.len,
                "truncating line input"
            );
            zscii.truncate(input.len as usize);
        }
        let buffer = input.buffer as usize;
        machine.memory.write8(buffer + 1, zscii.len() as u8)?;
        machine.memory.write_bytes(buffer + 2, &zscii)?;
        if input.parse != 0 {
            self.text
                .tokenise(&mut machine.memory, &machine.header, input.buffer, input.parse, 0, false)?;
        }
        Ok(())
    }

    fn char_input(&mut self, key: KeyInput, storer: Variable) -> Result<()> {
        let machine = self.machine.as_mut().ok_or(VmError::NotStarted)?;
        if machine.halted {
            return Err(VmError::Halted.into());
        }
        let code = self.text.key_input(&machine.memory, &machine.header, key)?;
        machine.write_var(storer, code)
    }

    fn resume(&mut self, result: Option<StoreResult>) -> Result<()> {
        let machine = self.running()?;
        match result {
            Some(r) => machine.write_var(r.storer, r.value),
            None => Ok(()),
        }
    }

    /// Fetch, compile on a miss, execute; until a unit asks for the host or
    /// the time slice runs out.
    fn run(&mut self) -> Result<()> {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.time_slice_ms);
        let Engine {
            config,
            machine,
            cache,
            undo,
            generator,
            text,
            ui,
            orders,
            ..
        } = self;
        let machine = machine.as_mut().ok_or(VmError::NotStarted)?;

        loop {
            let pc = machine.state.pc;
            let unit = match cache.lookup(pc) {
                Some(unit) => unit,
                None => {
                    let unit = generator.compile(&machine.memory, &machine.header, pc)?;
                    if pc < machine.header.static_memory {
                        warn!(
                            target: "zvm::codegen",
                            pc,
                            static_memory = machine.header.static_memory,
                            "caching a unit in dynamic memory"
                        );
                    }
                    debug!(target: "zvm::codegen", unit = %unit, "compiled");
                    cache.insert(unit)
                }
            };

            let mut ctx = ExecContext::new(machine, &mut **ui, &**text, undo, config);
            unit.execute(&mut ctx).with_context(|| format!("while executing {}", unit))?;
            if let Some(order) = ctx.take_control() {
                if order == Order::Quit {
                    machine.halted = true;
                }
                act(&mut **ui, orders, order);
                return Ok(());
            }

            if started.elapsed() >= budget {
                act(&mut **ui, orders, Order::Tick);
                return Ok(());
            }
        }
    }
}

fn store(machine: &mut Machine, storer: Option<Variable>, value: u16) -> Result<()> {
    match storer {
        Some(var) => machine.write_var(var, value),
        None => Ok(()),
    }
}

/// Flush buffered output, then the status line, then the control order.
fn act(ui: &mut dyn Ui, orders: &mut Vec<Order>, control: Order) {
    orders.extend(ui.flush());
    if let Some(text) = ui.take_status() {
        orders.push(Order::Stream {
            to: StreamTarget::Status,
            text,
            style: 0,
        });
    }
    debug!(target: "zvm::engine", order = control.code(), pending = orders.len(), "yielding to host");
    orders.push(control);
}
