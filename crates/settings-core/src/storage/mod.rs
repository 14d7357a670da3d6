//! Storage backends: where settings are persisted.
//!
//! A [`crate::Resolver`] routes every setting to one attached backend.  A
//! backend only ever sees *local* names (the part after its own name), plain
//! text values and type tags.
//!
//! # Lifetime and locking
//!
//! The resolver wraps every attached backend in a [`SharedStorage`]: an
//! `Arc` around the backend's own `Mutex`.  Every operation clones the `Arc`
//! out of the resolver's registry, releases the registry lock, and only then
//! locks the backend.  A backend removed while another thread is still inside
//! one of its operations therefore stays alive until that operation returns,
//! and a slow backend never blocks unrelated resolver bookkeeping.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::defaults::DefaultOverlay;
use crate::domain::error::{ErrorChannel, ErrorKind};
use crate::domain::name::full_setting_name;
use crate::domain::type_tag::TypeTag;
use crate::domain::value::StoredValue;

pub mod file;
pub mod format;
pub mod memory;

pub use file::{FileStorage, FileStorageError, FileStorageOptions, FlushPolicy, OpenMode};
pub use memory::MemoryStorage;

/// What a backend learns about its owner when it is attached: the name it
/// was attached under, the owner's default overlay and its error channel.
#[derive(Debug, Clone)]
pub struct StorageContext {
    name: String,
    defaults: DefaultOverlay,
    errors: ErrorChannel,
}

impl StorageContext {
    pub fn new(name: impl Into<String>, defaults: DefaultOverlay, errors: ErrorChannel) -> Self {
        Self {
            name: name.into(),
            defaults,
            errors,
        }
    }

    /// The name this backend is attached under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name of a local setting name.
    pub fn full_setting_name(&self, local_name: &str) -> String {
        full_setting_name(&self.name, local_name)
    }

    /// The default registered for a local setting name, if any.
    pub fn default_for(&self, local_name: &str) -> Option<StoredValue> {
        self.defaults.get(&self.full_setting_name(local_name))
    }

    /// Reports a fault through the owner's error channel.
    pub fn report(&self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.report(kind, message);
    }
}

/// The contract every persistence plugin implements.
///
/// All methods receive the [`StorageContext`] bound when the backend was
/// attached.  Calls are serialised by the backend's own mutex, so
/// implementations need no locking of their own unless they share state with
/// a background thread.
#[cfg_attr(test, mockall::automock)]
pub trait StorageBackend: Send {
    /// Persists pending modifications.  A no-op when nothing is dirty.
    fn save(&mut self, ctx: &StorageContext);

    /// Returns the value of `name`.
    ///
    /// Backends fall back to [`StorageContext::default_for`] on a miss and
    /// report [`ErrorKind::BadSettingName`] when there is no default either.
    fn get_setting(&mut self, name: &str, ctx: &StorageContext) -> Option<StoredValue>;

    /// Stores `value` under `name`.
    fn set_setting(&mut self, name: &str, value: &str, type_tag: &TypeTag, ctx: &StorageContext);

    /// Returns `true` if the backend itself holds `name`.  Never reports.
    fn contains(&mut self, name: &str, ctx: &StorageContext) -> bool;

    /// Snapshot of every `name -> value` pair.
    ///
    /// Enumeration is optional: the default reports
    /// [`ErrorKind::CannotEnumSettings`] and returns nothing.
    fn enumerate_settings(&mut self, ctx: &StorageContext) -> BTreeMap<String, String> {
        ctx.report(
            ErrorKind::CannotEnumSettings,
            format!("storage '{}' cannot enumerate its settings", ctx.name()),
        );
        BTreeMap::new()
    }
}

/// A backend attached to a resolver, shared by reference count.
pub type SharedStorage = Arc<AttachedStorage>;

/// A backend plus the context it was attached with.
pub struct AttachedStorage {
    context: StorageContext,
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl AttachedStorage {
    pub fn new(backend: Box<dyn StorageBackend>, context: StorageContext) -> Self {
        Self {
            context,
            backend: Mutex::new(backend),
        }
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn save(&self) {
        self.lock().save(&self.context);
    }

    pub fn get_setting(&self, name: &str) -> Option<StoredValue> {
        self.lock().get_setting(name, &self.context)
    }

    pub fn set_setting(&self, name: &str, value: &str, type_tag: &TypeTag) {
        self.lock().set_setting(name, value, type_tag, &self.context);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains(name, &self.context)
    }

    pub fn enumerate_settings(&self) -> BTreeMap<String, String> {
        self.lock().enumerate_settings(&self.context)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn StorageBackend>> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AttachedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedStorage")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
