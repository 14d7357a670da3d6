//! Setting handles: typed access to one named setting.
//!
//! A handle resolves its name once, when it is created, and caches only the
//! resulting `(place, local name)` pair.  Every read and write goes through
//! the resolver again, so handles never hold a backend open.
//!
//! | Handle              | Type fixed at | Access     |
//! |---------------------|---------------|------------|
//! | [`Setting<T>`]      | declaration   | read/write |
//! | [`DynSetting`]      | each use      | read/write |
//! | [`ConstSetting<T>`] | declaration   | read       |
//! | [`DynConst`]        | each use      | read       |
//! | [`EnumSetting<E>`]  | declaration   | read/write |

use std::marker::PhantomData;

use crate::domain::error::ErrorKind;
use crate::domain::name::{ResolveMode, ResolvedName};
use crate::domain::type_tag::TypeTag;
use crate::domain::value::{SettingEnum, SettingValue};
use crate::resolver::Resolver;

/// Reads `name` as `T`, falling back to `T::default()`.
///
/// A failed lookup has already been reported by the resolver; only a value
/// that is present but does not parse reports [`ErrorKind::CannotConvert`].
fn read_value<T>(resolver: &Resolver, name: &ResolvedName) -> T
where
    T: SettingValue + Default,
{
    if name.is_empty() {
        return T::default();
    }
    let Some(stored) = resolver.get(&name.place, &name.local_name, &T::type_tag()) else {
        return T::default();
    };
    match T::from_setting_str(&stored.value) {
        Some(value) => value,
        None => {
            resolver.report(
                ErrorKind::CannotConvert,
                format!(
                    "cannot convert {} value {:?} to {}",
                    name.full_name(),
                    stored.value,
                    T::type_tag()
                ),
            );
            T::default()
        }
    }
}

fn write_value<T: SettingValue>(resolver: &Resolver, name: &ResolvedName, value: &T) {
    if name.is_empty() {
        return;
    }
    resolver.set(
        &name.place,
        &name.local_name,
        &value.to_setting_string(),
        &T::type_tag(),
    );
}

/// A setting whose type is fixed at declaration.
///
/// ```ignore
/// let width: Setting<u32> = Setting::new(&resolver, "app.window.width");
/// width.write(&1024);
/// assert_eq!(width.read(), 1024);
/// ```
pub struct Setting<'r, T> {
    resolver: &'r Resolver,
    name: ResolvedName,
    _value: PhantomData<fn() -> T>,
}

impl<'r, T> Setting<'r, T>
where
    T: SettingValue + Default,
{
    pub fn new(resolver: &'r Resolver, name: &str) -> Self {
        Self {
            resolver,
            name: resolver.resolve(name, ResolveMode::Writable),
            _value: PhantomData,
        }
    }

    /// Current value, or `T::default()` when it is missing or does not
    /// parse.
    pub fn read(&self) -> T {
        read_value(self.resolver, &self.name)
    }

    pub fn write(&self, value: &T) {
        write_value(self.resolver, &self.name, value);
    }

    pub fn copy_from(&self, other: &Setting<'_, T>) {
        self.write(&other.read());
    }

    pub fn place(&self) -> &str {
        &self.name.place
    }

    pub fn name(&self) -> &str {
        &self.name.local_name
    }
}

/// A setting whose type is chosen at each access.
pub struct DynSetting<'r> {
    resolver: &'r Resolver,
    name: ResolvedName,
}

impl<'r> DynSetting<'r> {
    pub fn new(resolver: &'r Resolver, name: &str) -> Self {
        Self {
            resolver,
            name: resolver.resolve(name, ResolveMode::Writable),
        }
    }

    pub fn get<T: SettingValue + Default>(&self) -> T {
        read_value(self.resolver, &self.name)
    }

    pub fn set<T: SettingValue>(&self, value: &T) {
        write_value(self.resolver, &self.name, value);
    }

    pub fn as_string(&self) -> String {
        self.get::<String>()
    }

    /// Copies the stored text and type tag of `other` into this setting.
    pub fn copy_from(&self, other: &DynSetting<'_>) {
        if self.name.is_empty() || other.name.is_empty() {
            return;
        }
        if let Some(stored) = other
            .resolver
            .get(&other.name.place, &other.name.local_name, &TypeTag::Variant)
        {
            self.resolver
                .set(&self.name.place, &self.name.local_name, &stored.value, &stored.type_tag);
        }
    }

    /// `true` if a backend or the default overlay holds this setting.
    pub fn exists(&self) -> bool {
        !self.name.is_empty() && self.resolver.exists(&self.name.place, &self.name.local_name)
    }

    pub fn place(&self) -> &str {
        &self.name.place
    }

    pub fn name(&self) -> &str {
        &self.name.local_name
    }
}

/// A read-only setting of fixed type.
///
/// Creating it marks the name const, so any later writable handle on the
/// same name reports [`ErrorKind::ConstSetting`].
pub struct ConstSetting<'r, T> {
    resolver: &'r Resolver,
    name: ResolvedName,
    _value: PhantomData<fn() -> T>,
}

impl<'r, T> ConstSetting<'r, T>
where
    T: SettingValue + Default,
{
    pub fn new(resolver: &'r Resolver, name: &str) -> Self {
        resolver.force_setting_to_be_const(name);
        Self {
            resolver,
            name: resolver.resolve(name, ResolveMode::ReadOnly),
            _value: PhantomData,
        }
    }

    pub fn read(&self) -> T {
        read_value(self.resolver, &self.name)
    }

    pub fn place(&self) -> &str {
        &self.name.place
    }

    pub fn name(&self) -> &str {
        &self.name.local_name
    }
}

/// A read-only setting whose type is chosen at each access.
pub struct DynConst<'r> {
    resolver: &'r Resolver,
    name: ResolvedName,
}

impl<'r> DynConst<'r> {
    pub fn new(resolver: &'r Resolver, name: &str) -> Self {
        resolver.force_setting_to_be_const(name);
        Self {
            resolver,
            name: resolver.resolve(name, ResolveMode::ReadOnly),
        }
    }

    pub fn get<T: SettingValue + Default>(&self) -> T {
        read_value(self.resolver, &self.name)
    }

    pub fn as_string(&self) -> String {
        self.get::<String>()
    }

    pub fn place(&self) -> &str {
        &self.name.place
    }

    pub fn name(&self) -> &str {
        &self.name.local_name
    }
}

/// A setting holding an enumeration, stored by label.
///
/// Writes store the label registered for the value's code, or the bare
/// code when none is registered.  Reads accept either a registered label
/// or a numeric code.
pub struct EnumSetting<'r, E> {
    resolver: &'r Resolver,
    name: ResolvedName,
    _value: PhantomData<fn() -> E>,
}

impl<'r, E> EnumSetting<'r, E>
where
    E: SettingEnum + Default,
{
    pub fn new(resolver: &'r Resolver, name: &str) -> Self {
        Self {
            resolver,
            name: resolver.resolve(name, ResolveMode::Writable),
            _value: PhantomData,
        }
    }

    pub fn read(&self) -> E {
        if self.name.is_empty() {
            return E::default();
        }
        let Some(stored) = self
            .resolver
            .get(&self.name.place, &self.name.local_name, &TypeTag::String)
        else {
            return E::default();
        };

        let tag = E::type_tag();
        let text = stored.value.trim();
        let code = self
            .resolver
            .enum_code(&tag, text)
            .or_else(|| text.parse::<i64>().ok());
        match code.and_then(E::from_code) {
            Some(value) => value,
            None => {
                self.resolver.report(
                    ErrorKind::CannotConvert,
                    format!(
                        "{:?} is not a valid {} value for {}",
                        stored.value,
                        tag,
                        self.name.full_name()
                    ),
                );
                E::default()
            }
        }
    }

    pub fn write(&self, value: E) {
        if self.name.is_empty() {
            return;
        }
        let tag = E::type_tag();
        let code = value.code();
        let text = self
            .resolver
            .enum_label(&tag, code)
            .unwrap_or_else(|| code.to_string());
        self.resolver
            .set(&self.name.place, &self.name.local_name, &text, &tag);
    }

    pub fn place(&self) -> &str {
        &self.name.place
    }

    pub fn name(&self) -> &str {
        &self.name.local_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::domain::error::{ErrorChannel, SettingsError};
    use crate::domain::value::Variant;
    use crate::storage::MemoryStorage;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    enum Level {
        #[default]
        Low,
        High,
    }

    impl SettingEnum for Level {
        const TYPE_NAME: &'static str = "level";

        fn code(self) -> i64 {
            self as i64
        }

        fn from_code(code: i64) -> Option<Self> {
            match code {
                0 => Some(Level::Low),
                1 => Some(Level::High),
                _ => None,
            }
        }
    }

    crate::setting_enum!(Level);

    fn resolver_with_memory() -> (Resolver, MemoryStorage, Arc<Mutex<Vec<ErrorKind>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let resolver = Resolver::with_error_channel(ErrorChannel::with_handler(Arc::new(
            move |err: &SettingsError| sink.lock().unwrap().push(err.kind),
        )));
        let memory = MemoryStorage::new();
        resolver.add_storage("", memory.clone());
        (resolver, memory, seen)
    }

    #[test]
    fn test_setting_write_then_read() {
        let (resolver, memory, seen) = resolver_with_memory();
        let width: Setting<u32> = Setting::new(&resolver, "Window.Width");

        width.write(&1024);

        assert_eq!(width.read(), 1024);
        assert_eq!(memory.value("window.width").as_deref(), Some("1024"));
        assert_eq!(width.place(), "");
        assert_eq!(width.name(), "window.width");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unparsable_value_reports_cannot_convert_once() {
        // Arrange
        let (resolver, memory, seen) = resolver_with_memory();
        DynSetting::new(&resolver, "retries").set(&"many".to_string());

        // Act
        let retries: i32 = Setting::new(&resolver, "retries").read();

        // Assert
        assert_eq!(retries, 0);
        assert_eq!(memory.value("retries").as_deref(), Some("many"));
        assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::CannotConvert]);
    }

    #[test]
    fn test_missing_value_reports_only_the_lookup_failure() {
        let (resolver, _memory, seen) = resolver_with_memory();
        let flag: bool = Setting::new(&resolver, "missing.flag").read();
        assert!(!flag);
        assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::BadSettingName]);
    }

    #[test]
    fn test_missing_value_uses_registered_default() {
        let (resolver, _memory, seen) = resolver_with_memory();
        resolver.add_default_value("net.timeout", "2.5", TypeTag::Float);

        let timeout: f64 = Setting::new(&resolver, "net.timeout").read();

        assert_eq!(timeout, 2.5);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_copy_from_copies_value() {
        let (resolver, _memory, _) = resolver_with_memory();
        let a: Setting<String> = Setting::new(&resolver, "a");
        let b: Setting<String> = Setting::new(&resolver, "b");
        a.write(&"hello".to_string());

        b.copy_from(&a);

        assert_eq!(b.read(), "hello");
    }

    #[test]
    fn test_dyn_setting_reads_as_any_type() {
        let (resolver, _memory, _) = resolver_with_memory();
        let port = DynSetting::new(&resolver, "net.port");
        port.set(&8080u16);

        assert_eq!(port.get::<u16>(), 8080);
        assert_eq!(port.get::<i64>(), 8080);
        assert_eq!(port.as_string(), "8080");
        assert_eq!(port.get::<Variant>(), Variant("8080".to_string()));
        assert!(port.exists());
    }

    #[test]
    fn test_dyn_copy_from_keeps_type_tag() {
        let (resolver, memory, _) = resolver_with_memory();
        let src = DynSetting::new(&resolver, "src");
        let dst = DynSetting::new(&resolver, "dst");
        src.set(&true);

        dst.copy_from(&src);

        assert!(dst.get::<bool>());
        assert_eq!(memory.value("dst").as_deref(), Some("true"));
    }

    #[test]
    fn test_const_setting_marks_name_before_resolving() {
        // Arrange
        let (resolver, _memory, seen) = resolver_with_memory();
        resolver.add_default_value("app.version", "3", TypeTag::Unsigned);

        // Act
        let version: ConstSetting<u32> = ConstSetting::new(&resolver, "app.version");
        let read = version.read();
        assert!(seen.lock().unwrap().is_empty());
        let _writable = DynSetting::new(&resolver, "App.Version");

        // Assert
        assert_eq!(read, 3);
        assert!(resolver.is_const("app.version"));
        assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::ConstSetting]);
    }

    #[test]
    fn test_dyn_const_reads() {
        let (resolver, memory, _) = resolver_with_memory();
        DynSetting::new(&resolver, "build").set(&"release".to_string());

        let build = DynConst::new(&resolver, "build");

        assert_eq!(build.as_string(), "release");
        assert_eq!(memory.value("build").as_deref(), Some("release"));
    }

    #[test]
    fn test_enum_setting_stores_label() {
        // Arrange
        let (resolver, memory, seen) = resolver_with_memory();
        resolver.register_enum(&<Level as SettingEnum>::type_tag(), 0, "low").unwrap();
        resolver.register_enum(&<Level as SettingEnum>::type_tag(), 1, "high").unwrap();
        let level: EnumSetting<Level> = EnumSetting::new(&resolver, "log.level");

        // Act
        level.write(Level::High);

        // Assert
        assert_eq!(memory.value("log.level").as_deref(), Some("high"));
        assert_eq!(level.read(), Level::High);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_enum_setting_accepts_numeric_code() {
        let (resolver, _memory, _) = resolver_with_memory();
        DynSetting::new(&resolver, "log.level").set(&"1".to_string());

        let level: EnumSetting<Level> = EnumSetting::new(&resolver, "log.level");

        assert_eq!(level.read(), Level::High);
    }

    #[test]
    fn test_enum_setting_unknown_label_reports_cannot_convert() {
        let (resolver, _memory, seen) = resolver_with_memory();
        DynSetting::new(&resolver, "log.level").set(&"medium".to_string());

        let level: EnumSetting<Level> = EnumSetting::new(&resolver, "log.level");

        assert_eq!(level.read(), Level::Low);
        assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::CannotConvert]);
    }

    #[test]
    fn test_typed_setting_of_enum_goes_through_registry() {
        let (resolver, memory, _) = resolver_with_memory();
        resolver.register_enum(&<Level as SettingEnum>::type_tag(), 1, "high").unwrap();
        let level: Setting<Level> = Setting::new(&resolver, "level");

        level.write(&Level::High);

        assert_eq!(memory.value("level").as_deref(), Some("high"));
        assert_eq!(level.read(), Level::High);
    }

    #[test]
    fn test_invalid_name_reads_default_without_further_reports() {
        let (resolver, _memory, seen) = resolver_with_memory();
        let bad: Setting<u8> = Setting::new(&resolver, ".bad");

        bad.write(&3);

        assert_eq!(bad.read(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::BadSettingName]);
    }
}
