use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use rustyline::{DefaultEditor, error::ReadlineError};
use tracing::debug;
use zvm_core::{Engine, EngineConfig, Event, KeyInput, LineInput, Order, StoreResult, StreamTarget, Variable};

/// Where player input comes from.
pub(crate) trait LineSource {
    /// `None` once the player closes the input.
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>>;
}

/// rustyline editor, created on first use so stories that never read input
/// do not need a terminal.
#[derive(Default)]
struct Editor(Option<DefaultEditor>);

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        if self.0.is_none() {
            self.0 = Some(DefaultEditor::new()?);
        }
        let Some(editor) = self.0.as_mut() else {
            return Ok(None);
        };
        match editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn save_path(story: &Path, save_dir: &Path) -> PathBuf {
    let stem = story
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "story".to_string());
    save_dir.join(format!("{}.zsav", sanitize_filename::sanitize(stem)))
}

pub fn run(story: &Path, config: EngineConfig, save_dir: &Path) -> anyhow::Result<()> {
    let data = crate::read_story(story)?;
    let mut engine = Engine::new(config);
    engine.handle(Event::Load { data })?;
    let stdout = std::io::stdout();
    let mut session = Session::new(engine, Editor::default(), stdout.lock(), save_path(story, save_dir));
    session.play()
}

/// Drives the engine from a line source, printing main-window text and the
/// status line to `out`.
pub(crate) struct Session<L, W> {
    engine: Engine,
    input: L,
    out: W,
    save_path: PathBuf,
    // text after the last newline, used as the next input prompt
    pending: String,
    echo: Option<String>,
    status: Option<String>,
}

impl<L: LineSource, W: Write> Session<L, W> {
    pub(crate) fn new(engine: Engine, input: L, out: W, save_path: PathBuf) -> Self {
        Self {
            engine,
            input,
            out,
            save_path,
            pending: String::new(),
            echo: None,
            status: None,
        }
    }

    pub(crate) fn play(&mut self) -> anyhow::Result<()> {
        let mut event = Event::Restart;
        loop {
            let orders = self.engine.handle(event)?;
            let mut next = None;
            for order in orders {
                if order.is_control() {
                    next = self.answer(order)?;
                } else {
                    self.show(order)?;
                }
            }
            match next {
                Some(e) => event = e,
                None => {
                    let rest = std::mem::take(&mut self.pending);
                    write!(self.out, "{}", rest)?;
                    self.out.flush()?;
                    return Ok(());
                }
            }
        }
    }

    fn show(&mut self, order: Order) -> anyhow::Result<()> {
        match order {
            Order::Stream {
                to: StreamTarget::Main,
                text,
                ..
            } => self.write_main(&text),
            Order::Stream {
                to: StreamTarget::Status,
                text,
                ..
            } => {
                if self.status.as_deref() != Some(text.as_str()) {
                    writeln!(self.out, "[{}]", text.trim_end())?;
                    self.status = Some(text);
                }
                Ok(())
            }
            other => {
                debug!(target: "zvm::cli", order = other.code(), "not rendered");
                Ok(())
            }
        }
    }

    fn write_main(&mut self, text: &str) -> anyhow::Result<()> {
        let mut text = text;
        // the line editor already echoed what was typed
        if let Some(echo) = self.echo.take()
            && let Some(rest) = text.strip_prefix(echo.as_str())
        {
            text = rest;
        }
        self.pending.push_str(text);
        if let Some(cut) = self.pending.rfind('\n') {
            let rest = self.pending.split_off(cut + 1);
            self.out.write_all(self.pending.as_bytes())?;
            self.pending = rest;
        }
        Ok(())
    }

    fn prompt_line(&mut self) -> anyhow::Result<Option<String>> {
        self.out.flush()?;
        let prompt = std::mem::take(&mut self.pending);
        self.input.read_line(&prompt)
    }

    /// Turn a control order into the event that answers it; `None` ends the session.
    fn answer(&mut self, order: Order) -> anyhow::Result<Option<Event>> {
        let event = match order {
            Order::Tick => Event::Resume { result: None },
            Order::Read {
                buffer,
                parse,
                len,
                storer,
                ..
            } => {
                let Some(response) = self.prompt_line()? else {
                    return Ok(None);
                };
                self.echo = Some(format!("{}\n", response));
                Event::Read(LineInput {
                    response,
                    terminator: 13,
                    buffer,
                    parse,
                    len,
                    storer,
                })
            }
            Order::Char { storer, .. } => {
                let Some(line) = self.prompt_line()? else {
                    return Ok(None);
                };
                let key = line.chars().next().map_or(KeyInput::Enter, KeyInput::Char);
                Event::Char { key, storer }
            }
            Order::Save { data, storer } => {
                let value = match self.write_save(&data) {
                    Ok(()) => 1,
                    Err(err) => {
                        eprintln!("Error: {:#}", err);
                        0
                    }
                };
                resume_with(storer, value)
            }
            Order::Restore { storer } => {
                let data = match std::fs::read(&self.save_path) {
                    Ok(data) => Some(data),
                    Err(err) => {
                        eprintln!("Error: cannot read '{}': {}", self.save_path.display(), err);
                        None
                    }
                };
                Event::Restore { data, storer }
            }
            Order::Restart => Event::Restart,
            Order::Quit => return Ok(None),
            other => {
                self.show(other)?;
                return Ok(Some(Event::Resume { result: None }));
            }
        };
        Ok(Some(event))
    }

    fn write_save(&self, data: &[u8]) -> anyhow::Result<()> {
        std::fs::write(&self.save_path, data)
            .with_context(|| format!("Failed to write save file '{}'", self.save_path.display()))
    }
}

fn resume_with(storer: Option<Variable>, value: u16) -> Event {
    Event::Resume {
        result: storer.map(|storer| StoreResult { storer, value }),
    }
}
