//! `settings`: read and write settings files from the command line.
//!
//! ```text
//! settings --mount app=app.conf get app.window.width
//! settings --mount app=app.conf set app.window.width 1280 --type uint
//! settings list --json
//! settings copy backup.conf --no-overwrite
//! settings defaults shipped-defaults.conf
//! ```
//!
//! Mounts come from the config file (see `settings_cli::config`) plus any
//! `--mount NAME=PATH` arguments.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use settings_cli::commands::{self, ValueKind};
use settings_cli::config::{load_config, Mount};

/// Read and write settings stored in `name=value` files.
#[derive(Debug, Parser)]
#[command(name = "settings", version)]
struct Cli {
    /// Path of the TOML config file listing the mounts.
    #[arg(long, global = true, env = "SETTINGS_CONFIG")]
    config: Option<PathBuf>,

    /// Extra settings file to mount, as NAME=PATH (`=PATH` mounts the root).
    #[arg(long = "mount", value_name = "NAME=PATH", global = true)]
    mounts: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the value of a setting.
    Get { name: String },

    /// Write a setting.
    Set {
        name: String,
        value: String,
        /// How to validate and store the value.
        #[arg(long = "type", value_enum, default_value_t = ValueKind::String)]
        kind: ValueKind,
    },

    /// Print every mounted setting.
    List {
        /// Print a JSON object instead of name=value lines.
        #[arg(long)]
        json: bool,
    },

    /// Copy every mounted setting into another file.
    Copy {
        dest: PathBuf,
        /// Keep settings that already exist in DEST.
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Fill in missing settings from a defaults file.
    Defaults { file: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("cannot load configuration")?;

    // `RUST_LOG` wins over the configured level.  Logs go to stderr so they
    // never mix with command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let extra = cli
        .mounts
        .iter()
        .map(|arg| Mount::parse(arg))
        .collect::<Result<Vec<_>, _>>()?;
    let resolver = commands::build_resolver(&config, &extra)?;

    match cli.command {
        Command::Get { name } => println!("{}", commands::get(&resolver, &name)?),
        Command::Set { name, value, kind } => commands::set(&resolver, &name, &value, kind)?,
        Command::List { json } => print!("{}", commands::list(&resolver, json)?),
        Command::Copy { dest, no_overwrite } => {
            let added = commands::copy(&resolver, &dest, !no_overwrite)?;
            eprintln!("{added} new settings in {}", dest.display());
        }
        Command::Defaults { file } => {
            let written = commands::seed_defaults(&resolver, &file)?;
            eprintln!("{written} settings filled in from {}", file.display());
        }
    }
    Ok(())
}
