//! The configuration resolver.
//!
//! A [`Resolver`] owns a list of named storage backends, the default overlay,
//! the enum registry and the error channel.  It maps a dotted setting name to
//! the backend whose name is the longest matching prefix and dispatches reads
//! and writes to that backend.
//!
//! # Resolution
//!
//! ```text
//! backends:  ""  "app"  "app.window"
//!
//! app.window.width  ->  ("app.window", "width")
//! app.title         ->  ("app",        "title")
//! theme             ->  ("",           "theme")
//! ```
//!
//! Names are compared case-insensitively and local names are returned in
//! lower case.  When two backends share a name length the one attached last
//! wins.
//!
//! # Locking
//!
//! Structural state (backend list, const names, the default-registration
//! flag) sits behind one mutex that is never held across backend I/O.  Each
//! backend has its own mutex; see [`crate::storage`] for the lifetime rules.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, warn};

use crate::domain::defaults::DefaultOverlay;
use crate::domain::enums::{EnumRegistry, EnumRegistryError};
use crate::domain::error::{ErrorChannel, ErrorHandler, ErrorKind, ErrorPolicy, HandlerGuard};
use crate::domain::name::{full_setting_name, is_valid_name, normalize, ResolveMode, ResolvedName, SEPARATOR};
use crate::domain::type_tag::TypeTag;
use crate::domain::value::StoredValue;
use crate::storage::{AttachedStorage, SharedStorage, StorageBackend, StorageContext};

pub mod collections;
pub mod global;
pub mod handle;

pub use handle::{ConstSetting, DynConst, DynSetting, EnumSetting, Setting};

#[derive(Debug, Default)]
struct ResolverState {
    /// Attached backends in attachment order.
    storages: Vec<SharedStorage>,
    /// Lowercase names that must not be written.
    const_names: HashSet<String>,
    registering_defaults: bool,
}

impl ResolverState {
    fn find(&self, place: &str) -> Option<&SharedStorage> {
        let place = normalize(place);
        self.storages.iter().find(|s| s.name() == place)
    }

    /// The attached backend whose name is the longest prefix of `lower`
    /// followed by the separator.  The empty backend name matches
    /// everything.  Scans newest first and only replaces on a strictly
    /// longer match, so the most recently attached backend wins ties.
    fn best_place(&self, lower: &str) -> Option<&str> {
        let mut best: Option<&str> = None;
        for storage in self.storages.iter().rev() {
            let candidate = storage.name();
            let matches = candidate.is_empty()
                || (lower.len() > candidate.len()
                    && lower.starts_with(candidate)
                    && lower[candidate.len()..].starts_with(SEPARATOR));
            if matches && best.map_or(true, |b| candidate.len() > b.len()) {
                best = Some(candidate);
            }
        }
        best
    }
}

enum Lookup {
    NoStorages,
    Found(SharedStorage),
    Missing,
}

/// Routes setting names to storage backends.
///
/// All methods take `&self`; a resolver is meant to be shared between
/// threads, either by reference or through [`global`].
pub struct Resolver {
    state: Mutex<ResolverState>,
    defaults: DefaultOverlay,
    enums: RwLock<EnumRegistry>,
    errors: ErrorChannel,
}

impl Resolver {
    /// Creates a resolver with no backends and the [`ErrorPolicy::Log`]
    /// error policy.
    pub fn new() -> Self {
        Self::with_error_channel(ErrorChannel::default())
    }

    pub fn with_error_policy(policy: ErrorPolicy) -> Self {
        Self::with_error_channel(ErrorChannel::new(policy))
    }

    pub fn with_error_channel(errors: ErrorChannel) -> Self {
        Self {
            state: Mutex::new(ResolverState::default()),
            defaults: DefaultOverlay::new(),
            enums: RwLock::new(EnumRegistry::new()),
            errors,
        }
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    /// Splits `name` into the backend it belongs to and the name local to
    /// that backend.
    ///
    /// Faults are reported through the error channel:
    /// - an invalid name reports [`ErrorKind::BadSettingName`] and returns the
    ///   empty pair;
    /// - in [`ResolveMode::Writable`] a const name reports
    ///   [`ErrorKind::ConstSetting`], after which resolution proceeds;
    /// - with no backend attached, [`ErrorKind::NoStorages`] is reported and
    ///   the empty pair returned.
    ///
    /// While defaults are being registered every name resolves to
    /// `("", name)`.  A name no backend matches resolves to `("", name)` as
    /// well, which routes it to the default overlay.
    pub fn resolve(&self, name: &str, mode: ResolveMode) -> ResolvedName {
        if !is_valid_name(name) {
            self.report(ErrorKind::BadSettingName, format!("invalid setting name {name:?}"));
            return ResolvedName::default();
        }
        let lower = normalize(name);

        let (is_const, registering, place) = {
            let state = self.lock();
            let place = if state.storages.is_empty() {
                None
            } else {
                Some(state.best_place(&lower).map(str::to_string))
            };
            (state.const_names.contains(&lower), state.registering_defaults, place)
        };

        if mode == ResolveMode::Writable && is_const {
            self.report(
                ErrorKind::ConstSetting,
                format!("setting {name} is const and cannot be written"),
            );
        }
        if registering {
            return ResolvedName::new("", name);
        }

        match place {
            None => {
                self.report(ErrorKind::NoStorages, format!("cannot resolve {name}"));
                ResolvedName::default()
            }
            Some(Some(place)) => {
                let local = if place.is_empty() {
                    lower
                } else {
                    lower[place.len() + SEPARATOR.len_utf8()..].to_string()
                };
                ResolvedName::new(place, local)
            }
            Some(None) => ResolvedName::new("", name),
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Reads a resolved setting.
    ///
    /// The matching backend answers (and falls back to defaults itself);
    /// without a matching backend the default overlay answers, and failing
    /// that [`ErrorKind::StorageNotFound`] is reported.
    ///
    /// When `requested` is a registered enumeration and the stored text is
    /// one of its labels, the label is translated into its numeric code and
    /// returned as [`TypeTag::Variant`].
    pub fn get(&self, place: &str, local_name: &str, requested: &TypeTag) -> Option<StoredValue> {
        let value = match self.lookup(place) {
            Lookup::NoStorages => {
                self.report(
                    ErrorKind::NoStorages,
                    format!("cannot get {}", full_setting_name(place, local_name)),
                );
                return None;
            }
            Lookup::Found(storage) => storage.get_setting(local_name)?,
            Lookup::Missing => {
                let full = full_setting_name(place, local_name);
                match self.defaults.get(&full) {
                    Some(value) => value,
                    None => {
                        self.report(
                            ErrorKind::StorageNotFound,
                            format!("no storage holds {full}"),
                        );
                        return None;
                    }
                }
            }
        };
        Some(self.label_to_code(value, requested))
    }

    /// Writes a resolved setting.
    ///
    /// During default registration the value goes into the default overlay.
    /// Enumeration codes are translated into their registered labels before
    /// they reach the backend.
    pub fn set(&self, place: &str, local_name: &str, value: &str, type_tag: &TypeTag) {
        if self.lock().registering_defaults {
            self.defaults
                .add(&full_setting_name(place, local_name), value, type_tag.clone());
            return;
        }

        let storage = match self.lookup(place) {
            Lookup::Found(storage) => storage,
            Lookup::NoStorages => {
                self.report(
                    ErrorKind::NoStorages,
                    format!("cannot set {}", full_setting_name(place, local_name)),
                );
                return;
            }
            Lookup::Missing => {
                self.report(
                    ErrorKind::StorageNotFound,
                    format!(
                        "no storage to write {}",
                        full_setting_name(place, local_name)
                    ),
                );
                return;
            }
        };

        match self.code_to_label(value, type_tag) {
            Some(label) => storage.set_setting(local_name, &label, type_tag),
            None => storage.set_setting(local_name, value, type_tag),
        }
    }

    /// `true` if the matching backend holds the setting or a default exists
    /// for it.  Never reports.
    pub fn exists(&self, place: &str, local_name: &str) -> bool {
        let in_storage = match self.lookup(place) {
            Lookup::Found(storage) => storage.contains(local_name),
            Lookup::NoStorages | Lookup::Missing => false,
        };
        in_storage || self.defaults.contains(&full_setting_name(place, local_name))
    }

    /// Flushes every backend, in attachment order.
    pub fn save(&self) {
        for storage in self.snapshot() {
            storage.save();
        }
    }

    /// Every setting of every backend, keyed by full name.
    pub fn enumerate_settings(&self) -> BTreeMap<String, String> {
        let mut all = BTreeMap::new();
        for storage in self.snapshot() {
            for (key, value) in storage.enumerate_settings() {
                if key.is_empty() {
                    continue;
                }
                all.insert(full_setting_name(storage.name(), &key), value);
            }
        }
        all
    }

    /// Copies every setting of every backend into `other`, overwriting what
    /// `other` already has, then saves `other`.
    pub fn copy_into(&self, other: &Resolver) {
        self.copy_settings(other, true);
    }

    /// Like [`Resolver::copy_into`] but leaves settings that already exist
    /// in `other` (in a backend or as a default) untouched.
    pub fn copy_into_no_overwrite(&self, other: &Resolver) {
        self.copy_settings(other, false);
    }

    fn copy_settings(&self, other: &Resolver, overwrite: bool) {
        let mut copied = 0usize;
        for (full, value) in self.enumerate_settings() {
            let target = other.resolve(&full, ResolveMode::DontCare);
            if target.is_empty() {
                continue;
            }
            if !overwrite && other.exists(&target.place, &target.local_name) {
                continue;
            }
            other.set(&target.place, &target.local_name, &value, &TypeTag::String);
            copied += 1;
        }
        debug!(copied, overwrite, "settings copied");
        other.save();
    }

    // ── Const names ───────────────────────────────────────────────────────────

    /// Marks `name` read-only: resolving it in [`ResolveMode::Writable`]
    /// from now on reports [`ErrorKind::ConstSetting`].
    pub fn force_setting_to_be_const(&self, name: &str) {
        self.lock().const_names.insert(normalize(name));
    }

    pub fn is_const(&self, name: &str) -> bool {
        self.lock().const_names.contains(&normalize(name))
    }

    // ── Backends ──────────────────────────────────────────────────────────────

    /// Attaches `backend` under `name` (`""` for the root backend).
    ///
    /// Attaching a name twice reports [`ErrorKind::StorageAlreadyExists`];
    /// the earlier backend is removed (and saved) and replaced.
    pub fn add_storage(&self, name: &str, backend: impl StorageBackend + 'static) {
        let name = normalize(name);
        let context = StorageContext::new(name.clone(), self.defaults.clone(), self.errors.clone());
        let storage = Arc::new(AttachedStorage::new(Box::new(backend), context));

        let replaced = {
            let mut state = self.lock();
            let previous = state
                .storages
                .iter()
                .position(|s| s.name() == name)
                .map(|i| state.storages.remove(i));
            state.storages.push(storage);
            previous
        };

        if let Some(previous) = replaced {
            self.report(
                ErrorKind::StorageAlreadyExists,
                format!("storage '{name}' already exists; replacing it"),
            );
            previous.save();
        }
        debug!(storage = %name, "storage attached");
    }

    /// Detaches the backend called `name` and saves it.  Returns `false` if
    /// no such backend is attached.
    ///
    /// Threads still inside a call on the backend keep it alive until they
    /// return.
    pub fn remove_storage(&self, name: &str) -> bool {
        let name = normalize(name);
        let removed = {
            let mut state = self.lock();
            state
                .storages
                .iter()
                .position(|s| s.name() == name)
                .map(|i| state.storages.remove(i))
        };
        match removed {
            Some(storage) => {
                storage.save();
                debug!(storage = %name, "storage removed");
                true
            }
            None => false,
        }
    }

    /// Detaches and saves every backend.
    pub fn remove_all_storages(&self) {
        let removed = std::mem::take(&mut self.lock().storages);
        for storage in removed {
            storage.save();
        }
    }

    /// Names of the attached backends in attachment order.
    pub fn storage_names(&self) -> Vec<String> {
        self.lock()
            .storages
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn has_storage(&self, name: &str) -> bool {
        self.lock().find(name).is_some()
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    /// Runs `register` in default-registration mode: every setting written
    /// through this resolver while it runs lands in the default overlay.
    ///
    /// A nested call (from inside `register`) is logged and ignored.
    pub fn register_defaults<F>(&self, register: F)
    where
        F: FnOnce(&Resolver),
    {
        {
            let mut state = self.lock();
            if state.registering_defaults {
                warn!("default registration re-entered; ignoring nested registration");
                return;
            }
            state.registering_defaults = true;
        }
        let _guard = RegistrationGuard { resolver: self };
        register(self);
    }

    pub fn is_registering_defaults(&self) -> bool {
        self.lock().registering_defaults
    }

    /// Registers (or replaces) the default of the fully qualified `name`.
    pub fn add_default_value(&self, name: &str, value: &str, type_tag: TypeTag) {
        self.defaults.add(name, value, type_tag);
    }

    pub fn default_value(&self, name: &str) -> Option<StoredValue> {
        self.defaults.get(name)
    }

    /// Registers defaults from `name=value` lines.  Blank lines and `#`
    /// comments are skipped; other lines without `=` are logged and skipped.
    /// Returns the number of defaults registered.
    pub fn add_default_lines<I, S>(&self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if self.defaults.add_line(line) {
                added += 1;
            } else {
                warn!(line, "ignoring malformed default line");
            }
        }
        added
    }

    pub fn defaults(&self) -> &DefaultOverlay {
        &self.defaults
    }

    // ── Enumerations ──────────────────────────────────────────────────────────

    /// Registers `label` as the stored form of `code` for the enumeration
    /// `type_tag`.
    ///
    /// # Errors
    ///
    /// See [`EnumRegistry::register`].
    pub fn register_enum(&self, type_tag: &TypeTag, code: i64, label: &str) -> Result<(), EnumRegistryError> {
        self.enums
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(type_tag, code, label)
    }

    pub fn is_enum(&self, type_tag: &TypeTag) -> bool {
        self.enums_read().is_enum(type_tag)
    }

    pub fn enum_code(&self, type_tag: &TypeTag, label: &str) -> Option<i64> {
        self.enums_read().code_of(type_tag, label)
    }

    pub fn enum_label(&self, type_tag: &TypeTag, code: i64) -> Option<String> {
        self.enums_read().label_of(type_tag, code).map(str::to_string)
    }

    fn label_to_code(&self, value: StoredValue, requested: &TypeTag) -> StoredValue {
        if !matches!(requested, TypeTag::Enum(_)) {
            return value;
        }
        match self.enum_code(requested, value.value.trim()) {
            Some(code) => StoredValue::new(code.to_string(), TypeTag::Variant),
            None => value,
        }
    }

    fn code_to_label(&self, value: &str, type_tag: &TypeTag) -> Option<String> {
        if !matches!(type_tag, TypeTag::Enum(_)) {
            return None;
        }
        let code = value.trim().parse::<i64>().ok()?;
        self.enum_label(type_tag, code)
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    pub fn errors(&self) -> &ErrorChannel {
        &self.errors
    }

    /// Installs `handler` and returns the previous one.
    pub fn set_error_handler(&self, handler: ErrorHandler) -> ErrorHandler {
        self.errors.set_handler(handler)
    }

    pub fn set_error_policy(&self, policy: ErrorPolicy) -> ErrorHandler {
        self.errors.set_handler(policy.into_handler())
    }

    pub fn error_handler(&self) -> ErrorHandler {
        self.errors.handler()
    }

    /// Installs `handler` until the returned guard is dropped.
    pub fn scoped_error_handler(&self, handler: ErrorHandler) -> HandlerGuard {
        self.errors.scoped(handler)
    }

    pub(crate) fn report(&self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.report(kind, message);
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn lookup(&self, place: &str) -> Lookup {
        let state = self.lock();
        if state.storages.is_empty() {
            return Lookup::NoStorages;
        }
        match state.find(place) {
            Some(storage) => Lookup::Found(Arc::clone(storage)),
            None => Lookup::Missing,
        }
    }

    fn snapshot(&self) -> Vec<SharedStorage> {
        self.lock().storages.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enums_read(&self) -> RwLockReadGuard<'_, EnumRegistry> {
        self.enums.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.save();
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("storages", &self.storage_names())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

/// Clears the default-registration flag on every exit path.
struct RegistrationGuard<'a> {
    resolver: &'a Resolver,
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        self.resolver.lock().registering_defaults = false;
    }
}
