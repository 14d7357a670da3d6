//! The default overlay: fallback values consulted when no backend holds a
//! setting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::name::normalize;
use crate::domain::type_tag::TypeTag;
use crate::domain::value::{unquote, StoredValue};

/// Thread-safe map from fully qualified setting name to its default value.
///
/// Cloning the overlay shares the underlying map; the resolver hands a clone
/// to every backend it attaches so backends can fall back to defaults
/// without holding a reference to the resolver itself.  Names are compared
/// case-insensitively.
#[derive(Clone, Default)]
pub struct DefaultOverlay {
    entries: Arc<Mutex<HashMap<String, StoredValue>>>,
}

impl DefaultOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the default for `name`.
    pub fn add(&self, name: &str, value: impl Into<String>, type_tag: TypeTag) {
        self.lock()
            .insert(normalize(name), StoredValue::new(value, type_tag));
    }

    /// Returns the default registered for `name`, if any.
    pub fn get(&self, name: &str) -> Option<StoredValue> {
        self.lock().get(&normalize(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registers a default from a `name=value` line.
    ///
    /// A value wrapped in double quotes is unescaped and tagged
    /// [`TypeTag::String`]; anything else is kept trimmed and tagged
    /// [`TypeTag::Variant`].  Returns `false` (and registers nothing) when
    /// the line has no `=` or an empty name.
    pub fn add_line(&self, line: &str) -> bool {
        let Some((name, value)) = line.split_once('=') else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let value = value.trim();
        match unquote(value) {
            Some(text) => self.add(name, text, TypeTag::String),
            None => self.add(name, value, TypeTag::Variant),
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredValue>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DefaultOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultOverlay")
            .field("len", &self.len())
            .finish()
    }
}
