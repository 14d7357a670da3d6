//! In-memory storage for tests and ephemeral settings.
//!
//! `MemoryStorage` holds values in a shared map instead of a file.  Cloning it
//! shares that map, so a test can attach one clone to a resolver and inspect
//! what was written through the other.
//!
//! ```ignore
//! let memory = MemoryStorage::new();
//! resolver.add_storage("session", memory.clone());
//!
//! DynSetting::new(&resolver, "session.user").set(&"ann".to_string());
//! assert_eq!(memory.value("user").as_deref(), Some("ann"));
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::error::ErrorKind;
use crate::domain::name::normalize;
use crate::domain::type_tag::TypeTag;
use crate::domain::value::StoredValue;
use crate::storage::{StorageBackend, StorageContext};

/// A [`StorageBackend`] backed by a shared map keyed by lowercase name.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<BTreeMap<String, StoredValue>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-populated with `(name, value, tag)` triples.
    pub fn with_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a str, TypeTag)>) -> Self {
        let storage = Self::new();
        {
            let mut map = storage.lock();
            for (name, value, type_tag) in values {
                map.insert(normalize(name), StoredValue::new(value, type_tag));
            }
        }
        storage
    }

    /// The stored text of `name`, ignoring defaults.
    pub fn value(&self, name: &str) -> Option<String> {
        self.lock().get(&normalize(name)).map(|v| v.value.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// How many times [`StorageBackend::save`] was called on any clone.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredValue>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryStorage {
    fn save(&mut self, _ctx: &StorageContext) {
        self.saves.fetch_add(1, Ordering::SeqCst);
    }

    fn get_setting(&mut self, name: &str, ctx: &StorageContext) -> Option<StoredValue> {
        if let Some(value) = self.lock().get(&normalize(name)).cloned() {
            return Some(value);
        }
        let default = ctx.default_for(name);
        if default.is_none() {
            ctx.report(
                ErrorKind::BadSettingName,
                format!("cannot get setting {}", ctx.full_setting_name(name)),
            );
        }
        default
    }

    fn set_setting(&mut self, name: &str, value: &str, type_tag: &TypeTag, _ctx: &StorageContext) {
        self.lock()
            .insert(normalize(name), StoredValue::new(value, type_tag.clone()));
    }

    fn contains(&mut self, name: &str, _ctx: &StorageContext) -> bool {
        self.lock().contains_key(&normalize(name))
    }

    fn enumerate_settings(&mut self, _ctx: &StorageContext) -> BTreeMap<String, String> {
        self.lock()
            .iter()
            .map(|(name, stored)| (name.clone(), stored.value.clone()))
            .collect()
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("len", &self.len())
            .field("saves", &self.save_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::defaults::DefaultOverlay;
    use crate::domain::error::ErrorChannel;
    use crate::domain::error::ErrorPolicy;

    fn ctx() -> StorageContext {
        StorageContext::new("mem", DefaultOverlay::new(), ErrorChannel::new(ErrorPolicy::Ignore))
    }

    #[test]
    fn test_clones_share_values() {
        let storage = MemoryStorage::new();
        let mut attached = storage.clone();

        attached.set_setting("User", "ann", &TypeTag::String, &ctx());

        assert_eq!(storage.value("user").as_deref(), Some("ann"));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_with_values_and_enumerate() {
        let mut storage = MemoryStorage::with_values([
            ("a", "1", TypeTag::Unsigned),
            ("B", "x", TypeTag::String),
        ]);
        let all = storage.enumerate_settings(&ctx());
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(storage.contains("b", &ctx()));
    }

    #[test]
    fn test_get_falls_back_to_default() {
        let defaults = DefaultOverlay::new();
        defaults.add("mem.limit", "9", TypeTag::Unsigned);
        let ctx = StorageContext::new("mem", defaults, ErrorChannel::new(ErrorPolicy::Ignore));
        let mut storage = MemoryStorage::new();

        assert_eq!(
            storage.get_setting("limit", &ctx),
            Some(StoredValue::new("9", TypeTag::Unsigned))
        );
        assert_eq!(storage.get_setting("other", &ctx), None);
    }

    #[test]
    fn test_save_is_counted() {
        let storage = MemoryStorage::new();
        let mut attached = storage.clone();
        attached.save(&ctx());
        attached.save(&ctx());
        assert_eq!(storage.save_count(), 2);
    }
}
