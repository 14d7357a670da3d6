//! File-backed storage.
//!
//! The whole file is parsed into a [`Document`] when the storage is opened
//! and kept in memory.  Writes mark the storage *dirty*; the
//! [`FlushPolicy`] decides when the document is written back:
//!
//! - [`FlushPolicy::OnRequest`]: only on [`StorageBackend::save`],
//!   [`FileStorage::flush`] or drop.
//! - [`FlushPolicy::EachModify`]: after every modifying write.
//! - [`FlushPolicy::Periodic`]: a dedicated thread writes the document
//!   whenever it is dirty, once per interval.
//!
//! Whatever the policy, a dirty document is written one last time when the
//! storage is dropped.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error};

use crate::domain::error::ErrorKind;
use crate::domain::name::normalize;
use crate::domain::type_tag::TypeTag;
use crate::domain::value::StoredValue;
use crate::storage::format::{Document, FileRecord};
use crate::storage::{StorageBackend, StorageContext};

/// How often the periodic flusher checks its stop flag.
const STOP_POLL: Duration = Duration::from_millis(10);

/// Error type for file storage I/O.
#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("I/O error reading settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error writing settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether the file may be modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Writable,
    /// Every write is rejected with [`ErrorKind::BadSettingName`] and the
    /// file is never written.
    ReadOnly,
}

/// When a dirty document is written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    OnRequest,
    EachModify,
    Periodic(Duration),
}

impl Default for FlushPolicy {
    fn default() -> Self {
        FlushPolicy::Periodic(Duration::from_secs(1))
    }
}

/// Options for [`FileStorage::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStorageOptions {
    pub mode: OpenMode,
    pub flush_policy: FlushPolicy,
}

impl FileStorageOptions {
    pub fn read_only() -> Self {
        Self {
            mode: OpenMode::ReadOnly,
            flush_policy: FlushPolicy::OnRequest,
        }
    }

    pub fn with_flush_policy(mut self, flush_policy: FlushPolicy) -> Self {
        self.flush_policy = flush_policy;
        self
    }
}

/// In-memory state shared with the periodic flusher thread.
#[derive(Debug, Default)]
struct FileState {
    doc: Document,
    /// Lowercase name -> index into `doc.records`.
    index: HashMap<String, usize>,
    dirty: bool,
}

impl FileState {
    fn new(doc: Document) -> Self {
        let index = doc
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| (normalize(&record.name), i))
            .collect();
        Self {
            doc,
            index,
            dirty: false,
        }
    }

    fn record(&self, name: &str) -> Option<&FileRecord> {
        self.index
            .get(&normalize(name))
            .map(|&i| &self.doc.records[i])
    }

    /// Writes the document if it is dirty; the dirty flag is only cleared
    /// once the write succeeded.
    fn write_if_dirty(&mut self, path: &Path) -> Result<(), FileStorageError> {
        if !self.dirty {
            return Ok(());
        }
        write_document(path, &self.doc)?;
        self.dirty = false;
        debug!(path = %path.display(), records = self.doc.records.len(), "settings file saved");
        Ok(())
    }
}

struct Flusher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    fn spawn(path: PathBuf, state: Arc<Mutex<FileState>>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("settings-flush".to_string())
            .spawn(move || {
                let interval = interval.max(STOP_POLL);
                loop {
                    let started = Instant::now();
                    while started.elapsed() < interval {
                        if stop_flag.load(Ordering::Acquire) {
                            return;
                        }
                        std::thread::sleep(STOP_POLL);
                    }
                    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Err(e) = guard.write_if_dirty(&path) {
                        error!("periodic settings flush failed: {e}");
                    }
                }
            });
        match handle {
            Ok(handle) => Self {
                stop,
                handle: Some(handle),
            },
            Err(e) => {
                // Without a flusher the storage still saves on request and on drop.
                error!("could not start settings flush thread: {e}");
                Self { stop, handle: None }
            }
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("settings flush thread panicked");
            }
        }
    }
}

/// A [`StorageBackend`] persisting settings to a `name=value` text file.
pub struct FileStorage {
    path: PathBuf,
    options: FileStorageOptions,
    state: Arc<Mutex<FileState>>,
    flusher: Option<Flusher>,
}

impl FileStorage {
    /// Opens (and parses) the file at `path`.
    ///
    /// A missing file is not an error: the storage starts empty and the file
    /// is created on the first save.
    ///
    /// # Errors
    ///
    /// Returns [`FileStorageError::Read`] for any I/O error other than
    /// "not found".
    pub fn open(path: impl Into<PathBuf>, options: FileStorageOptions) -> Result<Self, FileStorageError> {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(text) => Document::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(source) => return Err(FileStorageError::Read { path, source }),
        };
        debug!(path = %path.display(), records = doc.records.len(), "settings file loaded");

        let state = Arc::new(Mutex::new(FileState::new(doc)));
        let flusher = match (options.mode, options.flush_policy) {
            (OpenMode::Writable, FlushPolicy::Periodic(interval)) => Some(Flusher::spawn(
                path.clone(),
                Arc::clone(&state),
                interval,
            )),
            _ => None,
        };

        Ok(Self {
            path,
            options,
            state,
            flusher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> FileStorageOptions {
        self.options
    }

    /// `true` when there are modifications not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Number of settings in the file.
    pub fn len(&self) -> usize {
        self.lock().doc.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The text the file would contain if it were saved now.
    pub fn render(&self) -> String {
        self.lock().doc.render()
    }

    /// Writes pending modifications, returning the I/O error instead of
    /// logging it.  A no-op for read-only storages and clean documents.
    ///
    /// # Errors
    ///
    /// Returns [`FileStorageError::Write`] when the file cannot be written;
    /// the storage stays dirty.
    pub fn flush(&self) -> Result<(), FileStorageError> {
        if self.options.mode == OpenMode::ReadOnly {
            return Ok(());
        }
        self.lock().write_if_dirty(&self.path)
    }

    fn save_or_log(&self) {
        if let Err(e) = self.flush() {
            error!("settings not saved: {e}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for FileStorage {
    fn save(&mut self, _ctx: &StorageContext) {
        self.save_or_log();
    }

    fn get_setting(&mut self, name: &str, ctx: &StorageContext) -> Option<StoredValue> {
        let found = self
            .lock()
            .record(name)
            .map(|record| StoredValue::new(record.value.clone(), record.type_tag.clone()));
        if found.is_some() {
            return found;
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

    fn set_setting(&mut self, name: &str, value: &str, type_tag: &TypeTag, ctx: &StorageContext) {
        if self.options.mode == OpenMode::ReadOnly {
            ctx.report(
                ErrorKind::BadSettingName,
                format!(
                    "cannot set setting {} (file is read-only)",
                    ctx.full_setting_name(name)
                ),
            );
            return;
        }

        let modified = {
            let mut state = self.lock();
            let key = normalize(name);
            match state.index.get(&key).copied() {
                Some(i) => {
                    let record = &mut state.doc.records[i];
                    if record.value == value {
                        false
                    } else {
                        record.value = value.to_string();
                        true
                    }
                }
                None => {
                    let i = state.doc.records.len();
                    state
                        .doc
                        .records
                        .push(FileRecord::new(key.clone(), value, type_tag.storage_kind()));
                    state.index.insert(key, i);
                    true
                }
            }
        };

        if modified {
            self.lock().dirty = true;
            if self.options.flush_policy == FlushPolicy::EachModify {
                self.save_or_log();
            }
        }
    }

    fn contains(&mut self, name: &str, _ctx: &StorageContext) -> bool {
        self.lock().record(name).is_some()
    }

    fn enumerate_settings(&mut self, _ctx: &StorageContext) -> BTreeMap<String, String> {
        self.lock()
            .doc
            .records
            .iter()
            .map(|record| (record.name.clone(), record.value.clone()))
            .collect()
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Some(mut flusher) = self.flusher.take() {
            flusher.stop();
        }
        self.save_or_log();
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn write_document(path: &Path, doc: &Document) -> Result<(), FileStorageError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| FileStorageError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, doc.render()).map_err(|source| FileStorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}
