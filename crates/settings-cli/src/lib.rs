//! # settings-cli
//!
//! Library half of the `settings` command: TOML configuration of the mounted
//! settings files and the implementation of each subcommand.  The binary in
//! `main.rs` only parses arguments, sets up logging and prints results.

pub mod commands;
pub mod config;

pub use commands::{build_resolver, ValueKind};
pub use config::{load_config, CliConfig, ConfigError, FlushMode, Mount};
