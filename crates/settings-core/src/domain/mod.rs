//! Domain types for settings resolution.
//!
//! Everything in here is plain data plus the rules that govern it: names,
//! type tags, value codecs, the default overlay, the enum registry and the
//! error channel.  Nothing in this module performs I/O.

pub mod defaults;
pub mod enums;
pub mod error;
pub mod name;
pub mod type_tag;
pub mod value;

pub use defaults::DefaultOverlay;
pub use enums::{EnumRegistry, EnumRegistryError};
pub use error::{ErrorChannel, ErrorHandler, ErrorKind, ErrorPolicy, HandlerGuard, SettingsError};
pub use name::{full_setting_name, is_valid_name, ResolveMode, ResolvedName, SEPARATOR};
pub use type_tag::TypeTag;
pub use value::{parse_bool, SettingEnum, SettingValue, StoredValue, Variant};
