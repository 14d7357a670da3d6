//! Type tags: the semantic type attached to every stored value.

use std::borrow::Cow;
use std::fmt;

/// Identifies the semantic type of a setting value.
///
/// Values always cross the storage boundary as strings; the tag travels next
/// to the string so backends can pick an on-disk encoding and the resolver
/// can recognise enumerations.  Two tags are equal iff they denote the same
/// type.  The derived ordering only exists so tags can key ordered maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    String,
    Bool,
    Signed,
    Unsigned,
    Float,
    /// Opaque value of no particular type.
    Variant,
    /// A registered enumeration, keyed by a stable type name.
    Enum(Cow<'static, str>),
}

impl TypeTag {
    /// Builds the tag of the enumeration named `name`.
    pub const fn enumeration(name: &'static str) -> Self {
        TypeTag::Enum(Cow::Borrowed(name))
    }

    /// Returns `true` for the tags whose text form is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Signed | TypeTag::Unsigned | TypeTag::Float)
    }

    /// Maps this tag onto the small set of encodings a text backend knows
    /// about.  Enumerations are stored by label, so they become
    /// [`TypeTag::Variant`].
    pub fn storage_kind(&self) -> TypeTag {
        match self {
            TypeTag::Enum(_) => TypeTag::Variant,
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::String => f.write_str("string"),
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::Signed => f.write_str("signed"),
            TypeTag::Unsigned => f.write_str("unsigned"),
            TypeTag::Float => f.write_str("float"),
            TypeTag::Variant => f.write_str("variant"),
            TypeTag::Enum(name) => write!(f, "enum:{name}"),
        }
    }
}
