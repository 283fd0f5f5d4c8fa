use std::path::PathBuf;

use anyhow::{Context, Result};
use binary_introspect::commands::{
    function_command, info_command, name_command, plt_command, stubs_command, symbols_command,
};
use binary_introspect::{build_config, parse_addr};
use clap::{ArgAction, Parser, Subcommand};
use introspect_core::Arch;
use tracing::subscriber::set_global_default as set_global_subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::FmtSubscriber;

/// Look up functions, addresses and import stubs in native binaries.
///
/// This CLI is a thin wrapper around `introspect-core`. All substantive logic
/// lives in the library so it can be tested thoroughly and reused from other
/// frontends.
#[derive(Parser, Debug)]
#[command(
    name = "binary-introspect",
    version,
    about = "Look up functions, addresses and import stubs in native binaries",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (can be supplied multiple times).
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    verbosity: u8,

    /// Load options from a config file (JSON for `.json`, YAML otherwise).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Decode as this architecture instead of the one in the file header
    /// (x86, x86_64, arm, arm64, riscv32, riscv64).
    #[arg(long, global = true)]
    arch: Option<Arch>,

    /// Use AT&T syntax for x86 listings.
    #[arg(long, global = true, default_value_t = false)]
    att: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show format, architecture, table sizes and SHA-256 of a binary.
    Info {
        binary: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Resolve a function by exact name and print its disassembly.
    Function {
        binary: PathBuf,

        /// Exact symbol name (Mach-O names without the leading underscore).
        name: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Name the function starting exactly at an address.
    Name {
        binary: PathBuf,

        /// Hexadecimal address, with or without `0x`.
        #[arg(value_parser = parse_addr)]
        address: u64,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Name the imported routine whose stub starts exactly at an address.
    Plt {
        binary: PathBuf,

        /// Hexadecimal address, with or without `0x`.
        #[arg(value_parser = parse_addr)]
        address: u64,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List function symbols in symbol-table order.
    Symbols {
        binary: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List dynamic-linking stubs.
    Stubs {
        binary: PathBuf,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    set_global_subscriber(subscriber).context("Failed to set tracing subscriber")?;

    let config = build_config(cli.config.as_deref(), cli.arch, cli.att)?;

    match cli.command {
        Command::Info { binary, json } => info_command(&binary, &config, json),
        Command::Function { binary, name, json } => {
            function_command(&binary, &name, &config, json)
        }
        Command::Name { binary, address, json } => name_command(&binary, address, &config, json),
        Command::Plt { binary, address, json } => plt_command(&binary, address, &config, json),
        Command::Symbols { binary, json } => symbols_command(&binary, &config, json),
        Command::Stubs { binary, json } => stubs_command(&binary, &config, json),
    }
}
