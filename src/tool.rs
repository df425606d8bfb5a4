// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for inspecting and driving a pagekv store file.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pagekv::{Config, KvStore, Value};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};
    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

fn init_tracing(quiet: bool, verbose: u8) -> LevelFilter {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    tracing_log::LogTracer::init().expect("failed to set log tracer");

    let registry = Registry::default();
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("PAGEKV_LOG")
        .from_env_lossy();

    let subscriber = registry.with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    level_filter
}

/// CLI tool for inspecting and driving a pagekv store file.
#[derive(Parser, Debug)]
#[command(name = "pagekv")]
#[command(about = "CLI tool for inspecting and driving a pagekv store file")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides -v.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the store file.
    path: PathBuf,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliValueType {
    Int,
    Float,
    String,
    Bytes,
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// Create a new, empty store file.
    Init {
        /// Minimum file size in bytes (rounded up to whole blocks).
        #[arg(long)]
        min_size_bytes: Option<u64>,
        /// Block size in bytes (power of two, 512..=65536).
        #[arg(long)]
        block_size: Option<u32>,
    },
    /// Read the value stored under a key.
    Get {
        key: String,
    },
    /// Insert a new key; fails if it already exists.
    Put {
        key: String,
        value: String,
        /// How to interpret `value`. Defaults to auto-detecting int/float/string.
        #[arg(long, value_enum)]
        r#type: Option<CliValueType>,
    },
    /// Replace the value of an existing key.
    Set {
        key: String,
        value: String,
        #[arg(long, value_enum)]
        r#type: Option<CliValueType>,
    },
    /// Remove a key.
    Delete {
        key: String,
    },
    /// Report whether a key exists.
    Exists {
        key: String,
    },
    /// List keys matching a SQL-style LIKE pattern (`%`, `_`).
    Filter {
        pattern: String,
    },
    /// Print a structural report of the store file.
    Analyze,
}

fn parse_value(raw: &str, ty: Option<CliValueType>) -> Value {
    match ty {
        Some(CliValueType::Int) => match raw.parse::<i64>() {
            Ok(v) => Value::Int64(v),
            Err(e) => die!("invalid integer {raw:?}: {e}"),
        },
        Some(CliValueType::Float) => match raw.parse::<f64>() {
            Ok(v) => Value::Float64(v),
            Err(e) => die!("invalid float {raw:?}: {e}"),
        },
        Some(CliValueType::String) => Value::String(raw.to_owned()),
        Some(CliValueType::Bytes) => match hex_decode(raw) {
            Ok(bytes) => Value::Bytes(bytes),
            Err(e) => die!("invalid hex bytes {raw:?}: {e}"),
        },
        None => {
            if let Ok(v) = raw.parse::<i64>() {
                Value::Int64(v)
            } else if let Ok(v) = raw.parse::<f64>() {
                Value::Float64(v)
            } else {
                Value::String(raw.to_owned())
            }
        }
    }
}

fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() % 2 != 0 {
        return Err("odd number of hex digits".to_owned());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

fn print_value(value: &Value) {
    match value {
        Value::Int64(v) => println!("{v} (int)"),
        Value::Float64(v) => println!("{v} (float)"),
        Value::String(s) => println!("{s} (string)"),
        Value::Bytes(b) => println!("{} (bytes, {} byte(s))", hex_encode(b), b.len()),
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn run(args: ToolArgs) -> pagekv::Result<()> {
    if let ToolCommand::Init { min_size_bytes, block_size } = args.command {
        let mut config = Config::new(&args.path);
        if let Some(bytes) = min_size_bytes {
            config = config.min_size_bytes(bytes);
        }
        if let Some(size) = block_size {
            config = config.block_size(size);
        }
        config.create()?;
        println!("initialized {}", args.path.display());
        return Ok(());
    }

    let mut store = KvStore::open(&args.path)?;
    match args.command {
        ToolCommand::Init { .. } => unreachable!("handled above"),
        ToolCommand::Get { key } => print_value(&store.get(&key)?),
        ToolCommand::Put { key, value, r#type } => {
            store.insert(&key, parse_value(&value, r#type))?;
            println!("OK (inserted)");
        }
        ToolCommand::Set { key, value, r#type } => {
            store.set(&key, parse_value(&value, r#type))?;
            println!("OK (set)");
        }
        ToolCommand::Delete { key } => {
            store.delete(&key)?;
            println!("OK (deleted)");
        }
        ToolCommand::Exists { key } => println!("{}", store.exists(&key)?),
        ToolCommand::Filter { pattern } => {
            for key in store.filter(&pattern)? {
                println!("{key}");
            }
        }
        ToolCommand::Analyze => print!("{}", store.analyze()?),
    }
    store.close()?;
    Ok(())
}

fn main() {
    let args = ToolArgs::parse();
    let level_filter = init_tracing(args.quiet, args.verbose);
    info!(
        "starting pagekv ({} {}), log level: {level_filter}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(args) {
        die!("Error: {}", e);
    }
}
