//! The error channel.
//!
//! None of the resolver or storage operations return an error value of their
//! own.  Every fault is reported exactly once, at the point where it is
//! detected, through the [`ErrorChannel`] of the owning resolver.  The
//! installed handler decides what a fault means: the stock policies ignore
//! it, log it, assert on it, or turn it into a panic.
//!
//! # Why a callback instead of `Result`? (for beginners)
//!
//! Settings are read from all over an application, usually in places where
//! "use the default and carry on" is the only sensible recovery.  Threading a
//! `Result` through every read would push that decision onto every caller.
//! Instead, the application picks a policy once (for example "panic in
//! tests, log in production") and callers simply receive a zero value when
//! something went wrong.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, warn};

/// The kinds of faults reported through the error channel.
///
/// The discriminants are stable integer codes and are exposed through
/// [`ErrorKind::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(i32)]
pub enum ErrorKind {
    /// No backend (and no default) serves the resolved place.
    #[error("storage not found")]
    StorageNotFound = 1,

    /// A value could not be converted between its text form and the
    /// requested type.
    #[error("cannot convert value")]
    CannotConvert = 2,

    /// An operation needed at least one attached backend.
    #[error("no storages attached")]
    NoStorages = 3,

    /// The name is empty, starts with the separator, or is unknown to a
    /// backend that has no default for it.
    #[error("bad setting name")]
    BadSettingName = 4,

    /// A backend was attached under a name that is already in use.
    #[error("storage already exists")]
    StorageAlreadyExists = 5,

    /// A backend cannot enumerate its settings.  Informational: partial
    /// results may still be valid.
    #[error("cannot enumerate settings")]
    CannotEnumSettings = 6,

    /// A write-mode resolution hit a setting marked const.
    #[error("setting is const")]
    ConstSetting = 7,
}

impl ErrorKind {
    /// Returns the stable integer code of this kind.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// One reported fault: its kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (code {code}): {message}", code = .kind.code())]
pub struct SettingsError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SettingsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A pluggable error callback.
pub type ErrorHandler = Arc<dyn Fn(&SettingsError) + Send + Sync>;

/// The stock error policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Drop every report.
    Ignore,
    /// Forward every report to `tracing::warn!`.
    #[default]
    Log,
    /// Forward every report to `tracing::debug!` (the quiet variant of
    /// [`ErrorPolicy::Log`], for debugger/trace output only).
    Debug,
    /// `debug_assert!` on every report: panics in debug builds, ignored in
    /// release builds.
    Assert,
    /// Panic with the formatted [`SettingsError`].
    Fatal,
}

impl ErrorPolicy {
    /// Builds the callback implementing this policy.
    pub fn into_handler(self) -> ErrorHandler {
        match self {
            ErrorPolicy::Ignore => Arc::new(|_: &SettingsError| {}),
            ErrorPolicy::Log => Arc::new(|err: &SettingsError| {
                warn!(code = err.kind.code(), "settings: {err}");
            }),
            ErrorPolicy::Debug => Arc::new(|err: &SettingsError| {
                debug!(code = err.kind.code(), "settings: {err}");
            }),
            ErrorPolicy::Assert => Arc::new(|err: &SettingsError| {
                debug_assert!(false, "settings: {err}");
            }),
            ErrorPolicy::Fatal => Arc::new(|err: &SettingsError| {
                panic!("settings: {err}");
            }),
        }
    }
}

/// Shared handle to the error callback of one resolver.
///
/// Cloning the channel shares the callback slot, so a handler swapped in
/// through one clone is seen by every backend holding another clone.
#[derive(Clone)]
pub struct ErrorChannel {
    handler: Arc<RwLock<ErrorHandler>>,
}

impl ErrorChannel {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self::with_handler(policy.into_handler())
    }

    pub fn with_handler(handler: ErrorHandler) -> Self {
        Self {
            handler: Arc::new(RwLock::new(handler)),
        }
    }

    /// Reports one fault through the current handler.
    ///
    /// The handler is cloned out of the slot before it runs, so a handler may
    /// itself report, swap handlers, or panic without poisoning the slot.
    pub fn report(&self, kind: ErrorKind, message: impl Into<String>) {
        let handler = self.handler();
        handler(&SettingsError::new(kind, message));
    }

    /// Returns the currently installed handler.
    pub fn handler(&self) -> ErrorHandler {
        Arc::clone(&self.handler.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Installs `handler` and returns the previous one.
    pub fn set_handler(&self, handler: ErrorHandler) -> ErrorHandler {
        let mut slot = self.handler.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, handler)
    }

    /// Installs `handler` until the returned guard is dropped.
    ///
    /// The previous handler is restored on every exit path, including
    /// unwinding out of a panicking handler.
    pub fn scoped(&self, handler: ErrorHandler) -> HandlerGuard {
        let previous = self.set_handler(handler);
        HandlerGuard {
            channel: self.clone(),
            previous: Some(previous),
        }
    }
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new(ErrorPolicy::default())
    }
}

impl std::fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorChannel").finish_non_exhaustive()
    }
}

/// Restores the previous error handler when dropped.
#[must_use = "the previous handler is restored as soon as the guard is dropped"]
pub struct HandlerGuard {
    channel: ErrorChannel,
    previous: Option<ErrorHandler>,
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.channel.set_handler(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_channel() -> (ErrorChannel, Arc<Mutex<Vec<SettingsError>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let channel = ErrorChannel::with_handler(Arc::new(move |err: &SettingsError| {
            sink.lock().unwrap().push(err.clone());
        }));
        (channel, seen)
    }

    #[test]
    fn test_error_kind_codes_are_stable() {
        assert_eq!(ErrorKind::StorageNotFound.code(), 1);
        assert_eq!(ErrorKind::CannotConvert.code(), 2);
        assert_eq!(ErrorKind::NoStorages.code(), 3);
        assert_eq!(ErrorKind::BadSettingName.code(), 4);
        assert_eq!(ErrorKind::StorageAlreadyExists.code(), 5);
        assert_eq!(ErrorKind::CannotEnumSettings.code(), 6);
        assert_eq!(ErrorKind::ConstSetting.code(), 7);
    }

    #[test]
    fn test_settings_error_display_includes_kind_code_and_message() {
        let err = SettingsError::new(ErrorKind::NoStorages, "while resolving app.x");
        assert_eq!(
            err.to_string(),
            "no storages attached (code 3): while resolving app.x"
        );
    }

    #[test]
    fn test_report_reaches_installed_handler_once() {
        // Arrange
        let (channel, seen) = collecting_channel();

        // Act
        channel.report(ErrorKind::BadSettingName, "empty name");

        // Assert
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, ErrorKind::BadSettingName);
        assert_eq!(seen[0].message, "empty name");
    }

    #[test]
    fn test_clones_share_the_handler_slot() {
        let (channel, seen) = collecting_channel();
        let other = channel.clone();

        other.report(ErrorKind::ConstSetting, "app.id");

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_scoped_handler_is_restored_on_drop() {
        // Arrange
        let (channel, seen) = collecting_channel();

        // Act
        {
            let _guard = channel.scoped(ErrorPolicy::Ignore.into_handler());
            channel.report(ErrorKind::StorageNotFound, "swallowed");
        }
        channel.report(ErrorKind::StorageNotFound, "visible");

        // Assert
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message, "visible");
    }

    #[test]
    fn test_scoped_handler_is_restored_after_panic() {
        // Arrange
        let (channel, seen) = collecting_channel();

        // Act – the fatal policy panics inside the guarded scope
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = channel.scoped(ErrorPolicy::Fatal.into_handler());
            channel.report(ErrorKind::NoStorages, "boom");
        }));
        channel.report(ErrorKind::NoStorages, "after");

        // Assert
        assert!(result.is_err(), "fatal policy must panic");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_ignore_policy_does_not_panic() {
        let channel = ErrorChannel::new(ErrorPolicy::Ignore);
        channel.report(ErrorKind::CannotConvert, "ignored");
    }

    #[test]
    fn test_default_policy_is_log() {
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Log);
    }
}
