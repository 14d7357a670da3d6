//! Setting names.
//!
//! A setting name is a dot-separated, case-insensitive string such as
//! `app.window.width`.  Resolution splits it into a *place* (the name of the
//! backend holding the setting, `""` for the root bucket) and the *local
//! name* handed to that backend.

/// Separator between the components of a dotted name.
pub const SEPARATOR: char = '.';

/// How a name is going to be used once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// The caller intends to write; const names are reported.
    Writable,
    /// The caller only reads.
    ReadOnly,
    /// Neither; used internally when copying between resolvers.
    DontCare,
}

/// The outcome of resolving a dotted name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResolvedName {
    /// Backend name; empty for the root bucket or an unresolvable place.
    pub place: String,
    /// Name of the setting inside that backend.
    pub local_name: String,
}

impl ResolvedName {
    pub fn new(place: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            place: place.into(),
            local_name: local_name.into(),
        }
    }

    /// The fully qualified name this resolution stands for.
    pub fn full_name(&self) -> String {
        full_setting_name(&self.place, &self.local_name)
    }

    /// `true` for the pair returned when resolution failed.
    pub fn is_empty(&self) -> bool {
        self.place.is_empty() && self.local_name.is_empty()
    }
}

/// Returns `true` if `name` is non-empty and does not start with the
/// separator.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with(SEPARATOR)
}

/// Lower-cases a name for case-insensitive comparison.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Joins a place and a local name.  When either part is empty the other is
/// returned unchanged.
pub fn full_setting_name(place: &str, local_name: &str) -> String {
    match (place.is_empty(), local_name.is_empty()) {
        (false, false) => format!("{place}{SEPARATOR}{local_name}"),
        (true, _) => local_name.to_string(),
        (false, true) => place.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("app"));
        assert!(is_valid_name("app.window.width"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(".app"));
    }

    #[test]
    fn test_full_setting_name_joins_with_separator() {
        assert_eq!(full_setting_name("user", "name"), "user.name");
        assert_eq!(full_setting_name("", "retries"), "retries");
        assert_eq!(full_setting_name("user", ""), "user");
    }

    #[test]
    fn test_resolved_name_full_name() {
        let resolved = ResolvedName::new("app.ui", "width");
        assert_eq!(resolved.full_name(), "app.ui.width");
        assert!(!resolved.is_empty());
        assert!(ResolvedName::default().is_empty());
    }

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize("App.Window"), "app.window");
    }
}
