use std::path::{Component, Path, PathBuf};
use std::sync::Once;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use zvm_core::{
    EngineConfig,
    header::Header,
    memory::Memory,
};

mod serve;
mod terminal;


static TRACE_INIT: Once = Once::new();
const DEFAULT_TRACE_FILTER: &str = "zvm::engine=debug,zvm::persist=debug,zvm=info";

#[derive(Debug, Parser)]
#[command(name = "zvm", author, version, about = "Z-machine (v5/v8) story player", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Story to play when no subcommand is given
    #[arg(value_name = "STORY", value_parser = parse_sanitized_path)]
    story: Option<PathBuf>,

    #[command(flatten)]
    engine: EngineArgs,
}

/// Engine settings shared by `run` and `serve`.
#[derive(Debug, Clone, Default, Args)]
struct EngineArgs {
    /// TOML file with engine settings; flags below override it
    #[arg(long, global = true, value_parser = parse_sanitized_path)]
    config: Option<PathBuf>,
    /// Screen width in characters
    #[arg(long, global = true)]
    width: Option<u8>,
    /// Advertise timed input
    #[arg(long, global = true)]
    timed: bool,
    /// Claim standard revision 1.2
    #[arg(long, global = true)]
    security_override: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Play a story in the terminal.
    Run {
        #[arg(value_name = "STORY", value_parser = parse_sanitized_path)]
        story: PathBuf,
        /// Directory that holds `.zsav` files
        #[arg(long, value_parser = parse_sanitized_path, default_value = ".")]
        save_dir: PathBuf,
    },
    /// Speak the host protocol as JSON lines on stdin/stdout.
    Serve {
        #[arg(value_name = "STORY", value_parser = parse_sanitized_path)]
        story: PathBuf,
    },
    /// Print the story header.
    Info {
        #[arg(value_name = "STORY", value_parser = parse_sanitized_path)]
        story: PathBuf,
    },
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        anyhow::bail!("Parent directory components ('..') are not allowed in file paths.");
    }
    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    !(trimmed.eq_ignore_ascii_case("0") || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("off"))
}

/// `ZVM_TRACE=1` turns logging on with the default filter; any other
/// non-false value is taken as a filter expression.
fn filter_expr_from(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("1") || trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("on")
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn maybe_init_tracing() {
    let Ok(raw) = std::env::var("ZVM_TRACE") else {
        return;
    };
    if !env_toggle_enabled(&raw) {
        return;
    }

    TRACE_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter_expr = filter_expr_from(&raw).or_else(|| std::env::var("RUST_LOG").ok());
        let builder = fmt().with_writer(std::io::stderr);
        let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(DEFAULT_TRACE_FILTER),
        };
        let _ = builder.try_init();
    });
}

pub(crate) fn engine_config(args: &EngineArgs) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("Invalid config '{}'", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    config.timed |= args.timed;
    config.security_override |= args.security_override;
    Ok(config)
}

pub(crate) fn read_story(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read story '{}'", path.display()))
}

fn print_info(path: &Path) -> anyhow::Result<()> {
    let memory = Memory::new(read_story(path)?);
    let header = Header::parse(&memory)?;
    println!("{}", serde_json::to_string_pretty(&header)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    maybe_init_tracing();

    let CliArgs { command, story, engine } = CliArgs::parse();
    match (command, story) {
        (Some(Commands::Run { story, save_dir }), _) => terminal::run(&story, engine_config(&engine)?, &save_dir),
        (Some(Commands::Serve { story }), _) => serve::run(&story, engine_config(&engine)?),
        (Some(Commands::Info { story }), _) => print_info(&story),
        (None, Some(story)) => terminal::run(&story, engine_config(&engine)?, Path::new(".")),
        (None, None) => anyhow::bail!("no story given; try `zvm run STORY`"),
    }
}
