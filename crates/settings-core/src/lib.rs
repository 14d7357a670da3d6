//! # settings-core
//!
//! Runtime settings addressed by dotted names, persisted by pluggable
//! storage backends.
//!
//! Callers read and write settings such as `app.window.width` without
//! knowing where each one lives.  A [`Resolver`] owns named backends and
//! routes every name to the backend whose name is its longest prefix,
//! falling back to registered defaults when no backend matches.
//!
//! - **`domain`**: names, type tags, value codecs, the default overlay, the
//!   enum registry and the error channel.  No I/O.
//! - **`storage`**: the [`StorageBackend`] contract plus the file-backed and
//!   in-memory backends.
//! - **`resolver`**: the [`Resolver`], typed setting handles, list/map
//!   helpers and the process-wide accessor.
//!
//! ```no_run
//! use settings_core::{FileStorage, FileStorageOptions, Resolver, Setting};
//!
//! let resolver = Resolver::new();
//! let file = FileStorage::open("app.conf", FileStorageOptions::default()).unwrap();
//! resolver.add_storage("app", file);
//!
//! let width: Setting<u32> = Setting::new(&resolver, "app.window.width");
//! width.write(&1024);
//! assert_eq!(width.read(), 1024);
//! ```
//!
//! Faults never surface as `Result`s from setting access; they go to the
//! resolver's error handler (see [`ErrorPolicy`]) and the access falls back
//! to the type's default value.

pub mod domain;
pub mod resolver;
pub mod storage;

pub use domain::{
    full_setting_name, is_valid_name, parse_bool, DefaultOverlay, EnumRegistry, EnumRegistryError,
    ErrorChannel, ErrorHandler, ErrorKind, ErrorPolicy, HandlerGuard, ResolveMode, ResolvedName,
    SettingEnum, SettingValue, SettingsError, StoredValue, TypeTag, Variant, SEPARATOR,
};
pub use resolver::collections::{read_list, read_map, write_list, write_map};
pub use resolver::global;
pub use resolver::{ConstSetting, DynConst, DynSetting, EnumSetting, Resolver, Setting};
pub use storage::{
    FileStorage, FileStorageError, FileStorageOptions, FlushPolicy, MemoryStorage, OpenMode,
    StorageBackend, StorageContext,
};
