//! Text codecs for the Rust types a setting can be read or written as.
//!
//! Every type usable through a setting handle implements [`SettingValue`]:
//! it names its [`TypeTag`] and converts to and from the canonical text form
//! that crosses the storage boundary.

use crate::domain::type_tag::TypeTag;

/// A value as it crosses the storage boundary: text plus its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub type_tag: TypeTag,
}

impl StoredValue {
    pub fn new(value: impl Into<String>, type_tag: TypeTag) -> Self {
        Self {
            value: value.into(),
            type_tag,
        }
    }
}

/// A Rust type that can be stored in a setting.
pub trait SettingValue: Sized {
    /// The tag sent to the resolver alongside the text form.
    fn type_tag() -> TypeTag;

    /// Canonical text form of the value.
    fn to_setting_string(&self) -> String;

    /// Parses the text form.  Returns `None` when `text` is not a valid
    /// representation of `Self`.
    fn from_setting_str(text: &str) -> Option<Self>;
}

impl SettingValue for String {
    fn type_tag() -> TypeTag {
        TypeTag::String
    }

    fn to_setting_string(&self) -> String {
        self.clone()
    }

    // Strings take the stored text verbatim, whitespace included.
    fn from_setting_str(text: &str) -> Option<Self> {
        Some(text.to_string())
    }
}

impl SettingValue for bool {
    fn type_tag() -> TypeTag {
        TypeTag::Bool
    }

    fn to_setting_string(&self) -> String {
        let text = if *self { "true" } else { "false" };
        text.to_string()
    }

    fn from_setting_str(text: &str) -> Option<Self> {
        parse_bool(text)
    }
}

/// Parses the boolean spellings accepted in stored values: `true`/`false`
/// and the numeric forms `1`/`0`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

macro_rules! numeric_setting_value {
    ($tag:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl SettingValue for $ty {
                fn type_tag() -> TypeTag {
                    $tag
                }

                fn to_setting_string(&self) -> String {
                    self.to_string()
                }

                fn from_setting_str(text: &str) -> Option<Self> {
                    text.trim().parse().ok()
                }
            }
        )+
    };
}

numeric_setting_value!(TypeTag::Signed => i8, i16, i32, i64, isize);
numeric_setting_value!(TypeTag::Unsigned => u8, u16, u32, u64, usize);
numeric_setting_value!(TypeTag::Float => f32, f64);

/// An opaque value: text with no declared type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Variant(pub String);

impl SettingValue for Variant {
    fn type_tag() -> TypeTag {
        TypeTag::Variant
    }

    fn to_setting_string(&self) -> String {
        self.0.clone()
    }

    fn from_setting_str(text: &str) -> Option<Self> {
        Some(Variant(text.to_string()))
    }
}

/// A Rust enumeration that round-trips through integer codes.
///
/// Labels for the codes are registered at runtime with
/// [`crate::Resolver::register_enum`]; implement [`SettingValue`] for the
/// type with [`setting_enum!`](crate::setting_enum) to use it in typed
/// handles.
pub trait SettingEnum: Copy + Sized {
    /// Stable identifier of the enumeration; becomes [`TypeTag::Enum`].
    const TYPE_NAME: &'static str;

    fn code(self) -> i64;

    fn from_code(code: i64) -> Option<Self>;

    fn type_tag() -> TypeTag {
        TypeTag::enumeration(Self::TYPE_NAME)
    }
}

/// Implements [`SettingValue`] for a type implementing [`SettingEnum`].
///
/// The text form handed to the resolver is the integer code; the resolver
/// swaps it for the registered label on the way to storage and back.
///
/// ```rust
/// use settings_core::{setting_enum, SettingEnum};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Color { Red = 1, Green = 2 }
///
/// impl SettingEnum for Color {
///     const TYPE_NAME: &'static str = "color";
///     fn code(self) -> i64 { self as i64 }
///     fn from_code(code: i64) -> Option<Self> {
///         match code { 1 => Some(Color::Red), 2 => Some(Color::Green), _ => None }
///     }
/// }
///
/// setting_enum!(Color);
/// ```
#[macro_export]
macro_rules! setting_enum {
    ($ty:ty) => {
        impl $crate::SettingValue for $ty {
            fn type_tag() -> $crate::TypeTag {
                <$ty as $crate::SettingEnum>::type_tag()
            }

            fn to_setting_string(&self) -> ::std::string::String {
                <$ty as $crate::SettingEnum>::code(*self).to_string()
            }

            fn from_setting_str(text: &str) -> ::std::option::Option<Self> {
                text.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(<$ty as $crate::SettingEnum>::from_code)
            }
        }
    };
}

/// Strips surrounding double quotes and unescapes the content.  Returns
/// `None` when `value` is not quoted.
pub fn unquote(value: &str) -> Option<String> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Some(unescape(&value[1..value.len() - 1]))
    } else {
        None
    }
}

/// Escapes `\`, newline, carriage return and `"` with a backslash.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '"' => escaped.push_str("\\\""),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Reverses [`escape`].  Unknown escape sequences are kept as written.
pub fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.peek() {
            Some('\\') => unescaped.push('\\'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('"') => unescaped.push('"'),
            _ => {
                unescaped.push('\\');
                continue;
            }
        }
        chars.next();
    }
    unescaped
}
