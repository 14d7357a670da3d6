//! Implementation of the `settings` subcommands.
//!
//! Each command works on a [`Resolver`] built from the configured mounts and
//! returns its output as a string, so the binary only has to print it.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Context};
use clap::ValueEnum;
use settings_core::storage::format::{parse_line, Line};
use settings_core::{
    parse_bool, FileStorage, FileStorageOptions, FlushPolicy, ResolveMode, Resolver, SettingsError,
    TypeTag,
};
use tracing::{debug, info};

use crate::config::{CliConfig, Mount};

/// Value types accepted by `settings set --type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    String,
    Bool,
    Int,
    Uint,
    Float,
}

impl ValueKind {
    pub fn type_tag(self) -> TypeTag {
        match self {
            ValueKind::String => TypeTag::String,
            ValueKind::Bool => TypeTag::Bool,
            ValueKind::Int => TypeTag::Signed,
            ValueKind::Uint => TypeTag::Unsigned,
            ValueKind::Float => TypeTag::Float,
        }
    }

    /// Checks `value` and returns its canonical text form.
    fn canonical(self, value: &str) -> Option<String> {
        let trimmed = value.trim();
        match self {
            ValueKind::String => Some(value.to_string()),
            ValueKind::Bool => parse_bool(trimmed).map(|b| b.to_string()),
            ValueKind::Int => trimmed.parse::<i64>().ok().map(|v| v.to_string()),
            ValueKind::Uint => trimmed.parse::<u64>().ok().map(|v| v.to_string()),
            ValueKind::Float => trimmed.parse::<f64>().ok().map(|v| v.to_string()),
        }
    }
}

/// Attaches every mount of `config` (plus `extra` mounts) to a new resolver.
///
/// # Errors
///
/// Fails when a mounted file exists but cannot be read.
pub fn build_resolver(config: &CliConfig, extra: &[Mount]) -> anyhow::Result<Resolver> {
    let resolver = Resolver::new();
    for mount in config.mounts.iter().chain(extra) {
        let storage = FileStorage::open(&mount.path, config.storage_options(mount))
            .with_context(|| format!("cannot mount {}", mount.path.display()))?;
        debug!(name = %mount.name, path = %mount.path.display(), "mounted settings file");
        resolver.add_storage(&mount.name, storage);
    }
    Ok(resolver)
}

/// `settings get NAME`
///
/// # Errors
///
/// Fails when no mount or default holds `name`.
pub fn get(resolver: &Resolver, name: &str) -> anyhow::Result<String> {
    let resolved = resolver.resolve(name, ResolveMode::ReadOnly);
    if resolved.is_empty() || !resolver.exists(&resolved.place, &resolved.local_name) {
        bail!("setting {name} not found");
    }
    resolver
        .get(&resolved.place, &resolved.local_name, &TypeTag::String)
        .map(|stored| stored.value)
        .with_context(|| format!("setting {name} could not be read"))
}

/// `settings set NAME VALUE [--type KIND]`
///
/// # Errors
///
/// Fails when `value` is not a valid `kind`, when no mount claims `name`, or
/// when the mount rejects the write (read-only files do).
pub fn set(resolver: &Resolver, name: &str, value: &str, kind: ValueKind) -> anyhow::Result<()> {
    let Some(canonical) = kind.canonical(value) else {
        bail!("{value:?} is not a valid {kind:?} value");
    };
    let resolved = resolver.resolve(name, ResolveMode::Writable);
    if resolved.is_empty() || !resolver.has_storage(&resolved.place) {
        bail!("no mount accepts setting {name}");
    }
    let failures = Arc::new(Mutex::new(Vec::<String>::new()));
    {
        let sink = Arc::clone(&failures);
        let _guard = resolver.scoped_error_handler(Arc::new(move |err: &SettingsError| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(err.to_string());
        }));
        resolver.set(&resolved.place, &resolved.local_name, &canonical, &kind.type_tag());
    }
    let failures = failures.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(failure) = failures.first() {
        bail!("setting {name} was not written: {failure}");
    }
    resolver.save();
    info!(name, "setting written");
    Ok(())
}

/// `settings list [--json]`
///
/// # Errors
///
/// Fails only if JSON encoding fails.
pub fn list(resolver: &Resolver, json: bool) -> anyhow::Result<String> {
    let all = resolver.enumerate_settings();
    if json {
        return serde_json::to_string_pretty(&all).context("cannot encode settings as JSON");
    }
    Ok(all
        .iter()
        .map(|(name, value)| format!("{name}={value}\n"))
        .collect())
}

/// `settings copy DEST [--no-overwrite]`: copies every mounted setting into
/// the file `dest`, keyed by full name.
///
/// # Errors
///
/// Fails when `dest` exists but cannot be read.
pub fn copy(resolver: &Resolver, dest: &Path, overwrite: bool) -> anyhow::Result<usize> {
    let options = FileStorageOptions::default().with_flush_policy(FlushPolicy::OnRequest);
    let storage = FileStorage::open(dest, options)
        .with_context(|| format!("cannot open {}", dest.display()))?;
    let target = Resolver::new();
    target.add_storage("", storage);

    let before = target.enumerate_settings().len();
    if overwrite {
        resolver.copy_into(&target);
    } else {
        resolver.copy_into_no_overwrite(&target);
    }
    let copied = target.enumerate_settings().len() - before;
    info!(dest = %dest.display(), added = copied, "settings copied");
    Ok(copied)
}

/// `settings defaults FILE`: writes each `name=value` line of `file` into
/// the mounts, skipping settings that already exist.  Returns how many
/// settings were written.
///
/// # Errors
///
/// Fails when `file` cannot be read.
pub fn seed_defaults(resolver: &Resolver, file: &Path) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read defaults from {}", file.display()))?;

    let mut written = 0;
    for line in text.lines() {
        let Line::Setting(record) = parse_line(line) else {
            continue;
        };
        let resolved = resolver.resolve(&record.name, ResolveMode::DontCare);
        if resolved.is_empty()
            || !resolver.has_storage(&resolved.place)
            || resolver.exists(&resolved.place, &resolved.local_name)
        {
            continue;
        }
        resolver.set(&resolved.place, &resolved.local_name, &record.value, &record.type_tag);
        written += 1;
    }
    resolver.save();
    Ok(written)
}
