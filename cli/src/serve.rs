//! JSON-lines host: one `Envelope` (an event plus optional `env`) per input line, one array of orders per
//! output line. Failures are reported as `{"error": ...}` and the session
//! keeps going.

use std::io::{BufRead, Write};
use std::path::Path;

use serde::Serialize;
use zvm_core::{Engine, EngineConfig, Envelope, Event, Order};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Reply {
    Orders(Vec<Order>),
    Error { error: String },
}

pub fn run(story: &Path, config: EngineConfig) -> anyhow::Result<()> {
    let data = crate::read_story(story)?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(data, config, stdin.lock(), stdout.lock())
}

/// The story is loaded up front; the peer starts it with `{"code":"restart"}`.
pub(crate) fn serve<R: BufRead, W: Write>(
    story: Vec<u8>,
    config: EngineConfig,
    input: R,
    mut output: W,
) -> anyhow::Result<()> {
    let mut engine = Engine::new(config);
    engine.handle(Event::Load { data: story })?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Envelope>(&line) {
            Ok(event) => match engine.handle(event) {
                Ok(orders) => Reply::Orders(orders),
                Err(err) => Reply::Error {
                    error: format!("{:#}", err),
                },
            },
            Err(err) => Reply::Error {
                error: format!("bad event: {}", err),
            },
        };
        serde_json::to_writer(&mut output, &reply)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}
