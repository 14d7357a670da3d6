//! Process-wide resolver.
//!
//! Most programs want exactly one resolver.  [`init`] builds it on first
//! use and runs the default registration once; afterwards [`resolver`] and
//! [`setting`] hand out `'static` access to it.
//!
//! Touching the process-wide resolver from inside its own default
//! registration is a programming error and panics instead of deadlocking.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::ThreadId;

use tracing::debug;

use crate::domain::value::SettingValue;
use crate::resolver::handle::{DynSetting, Setting};
use crate::resolver::Resolver;

/// A lazily initialised resolver slot.
pub struct GlobalResolver {
    cell: OnceLock<Resolver>,
    /// The thread currently running the initialisation, if any.
    initializer: Mutex<Option<ThreadId>>,
}

impl GlobalResolver {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            initializer: Mutex::new(None),
        }
    }

    /// Returns the resolver, creating it and running `register` in
    /// default-registration mode if this is the first call.
    ///
    /// Other threads calling in during initialisation block until it is
    /// done.
    ///
    /// # Panics
    ///
    /// Panics when called from inside `register` on the same slot.
    pub fn get_or_init_with<F>(&self, register: F) -> &Resolver
    where
        F: FnOnce(&Resolver),
    {
        if let Some(resolver) = self.cell.get() {
            return resolver;
        }
        let me = std::thread::current().id();
        if *self.lock_initializer() == Some(me) {
            panic!("settings resolver used from inside its own default registration");
        }
        self.cell.get_or_init(|| {
            let _marker = InitMarker::enter(self, me);
            let resolver = Resolver::new();
            resolver.register_defaults(register);
            debug!(defaults = resolver.defaults().len(), "settings resolver initialised");
            resolver
        })
    }

    pub fn get(&self) -> &Resolver {
        self.get_or_init_with(|_| {})
    }

    /// The resolver if it was already initialised.
    pub fn try_get(&self) -> Option<&Resolver> {
        self.cell.get()
    }

    /// Detaches (and saves) every backend of an initialised resolver.
    pub fn shutdown(&self) {
        if let Some(resolver) = self.cell.get() {
            resolver.remove_all_storages();
        }
    }

    fn lock_initializer(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.initializer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for GlobalResolver {
    fn default() -> Self {
        Self::new()
    }
}

struct InitMarker<'a> {
    slot: &'a GlobalResolver,
}

impl<'a> InitMarker<'a> {
    fn enter(slot: &'a GlobalResolver, thread: ThreadId) -> Self {
        *slot.lock_initializer() = Some(thread);
        Self { slot }
    }
}

impl Drop for InitMarker<'_> {
    fn drop(&mut self) {
        *self.slot.lock_initializer() = None;
    }
}

static GLOBAL: GlobalResolver = GlobalResolver::new();

/// Initialises the process-wide resolver with the defaults `register`
/// writes.  Later calls return the existing resolver without running
/// `register`.
pub fn init<F>(register: F) -> &'static Resolver
where
    F: FnOnce(&Resolver),
{
    GLOBAL.get_or_init_with(register)
}

/// The process-wide resolver, created without defaults if [`init`] has not
/// run yet.
pub fn resolver() -> &'static Resolver {
    GLOBAL.get()
}

/// Saves and detaches every backend of the process-wide resolver.
pub fn shutdown() {
    GLOBAL.shutdown();
}

/// A typed handle on the process-wide resolver.
pub fn setting<T: SettingValue + Default>(name: &str) -> Setting<'static, T> {
    Setting::new(resolver(), name)
}

/// A dynamically typed handle on the process-wide resolver.
pub fn dyn_setting(name: &str) -> DynSetting<'static> {
    DynSetting::new(resolver(), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::name::ResolveMode;
    use crate::domain::type_tag::TypeTag;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_registration_runs_once() {
        // Arrange
        let slot = GlobalResolver::new();
        let mut runs = 0;

        // Act
        slot.get_or_init_with(|r| {
            runs += 1;
            let name = r.resolve("app.retries", ResolveMode::Writable);
            r.set(&name.place, &name.local_name, "3", &TypeTag::Unsigned);
        });
        slot.get_or_init_with(|_| runs += 1);

        // Assert
        assert_eq!(runs, 1);
        let resolver = slot.try_get().unwrap();
        assert_eq!(resolver.default_value("app.retries").unwrap().value, "3");
        assert!(!resolver.is_registering_defaults());
    }

    #[test]
    fn test_nested_initialisation_panics_and_leaves_slot_empty() {
        let slot = GlobalResolver::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            slot.get_or_init_with(|_| {
                slot.get();
            });
        }));

        assert!(result.is_err());
        assert!(slot.try_get().is_none());
        slot.get();
        assert!(slot.try_get().is_some());
    }

    #[test]
    fn test_shutdown_saves_and_detaches() {
        let slot = GlobalResolver::new();
        let memory = MemoryStorage::new();
        slot.get().add_storage("", memory.clone());

        slot.shutdown();

        assert_eq!(memory.save_count(), 1);
        assert!(slot.get().storage_names().is_empty());
    }

    #[test]
    fn test_process_wide_accessors() {
        let resolver = init(|r| {
            r.add_default_value("global.test.greeting", "hi", TypeTag::String);
        });
        resolver.add_storage("global.test", MemoryStorage::new());

        let greeting: String = setting::<String>("global.test.greeting").read();
        dyn_setting("global.test.count").set(&2u8);

        assert_eq!(greeting, "hi");
        assert_eq!(setting::<u8>("global.test.count").read(), 2);
        shutdown();
        assert!(!resolver.has_storage("global.test"));
    }
}
