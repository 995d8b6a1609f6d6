//! Transactional table wrapper.
//!
//! Each logical table (tokens, messages, mailboxes, flags, users) is a
//! single shared resource. All access goes through [`Table::with_lock`]
//! or [`Table::read`]: a bounded-wait exclusive lock around the whole
//! read-modify-write, with file-backed tables persisted atomically on
//! success. A lock that cannot be acquired within the wait budget
//! yields [`Error::Busy`] instead of blocking forever.
//!
//! File-backed tables are shared between processes, not just threads:
//! every CLI invocation opens the same JSON documents. Each transaction
//! therefore also takes an OS advisory lock on a sidecar `.lock` file
//! and re-reads the table from disk before running, so a row persisted
//! by one process is visible to the next transaction in every other.
//! The lock lives beside the table file rather than on it because
//! persist replaces the table file by rename.
//!
//! Nested acquisition follows a fixed order: `flag` takes messages →
//! flags, everything else locks one table at a time.

use std::fs::{self, File, TryLockError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::flags::FlagTable;
use crate::messaging::{MailboxTable, MessageTable};
use crate::tokens::TokenTable;

/// How long a transaction waits for its lock before giving up.
const LOCK_WAIT: Duration = Duration::from_secs(5);

/// Poll interval while another process holds the file lock.
const LOCK_RETRY: Duration = Duration::from_millis(25);

/// One logical table: an in-memory value behind a bounded-wait mutex,
/// optionally mirrored to a JSON file.
pub struct Table<T> {
    name: &'static str,
    inner: Mutex<T>,
    path: Option<PathBuf>,
    lock_wait: Duration,
}

impl<T: Serialize + DeserializeOwned + Default> Table<T> {
    /// An unbacked in-memory table starting from `T::default()`.
    pub fn in_memory(name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(T::default()),
            path: None,
            lock_wait: LOCK_WAIT,
        }
    }

    /// Open a file-backed table, loading existing contents or starting
    /// from `T::default()` when the file does not exist yet.
    pub fn open(name: &'static str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Storage {
                table: name,
                source: e.into(),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => T::default(),
            Err(e) => {
                return Err(Error::Storage {
                    table: name,
                    source: e,
                })
            }
        };
        Ok(Self {
            name,
            inner: Mutex::new(inner),
            path: Some(path),
            lock_wait: LOCK_WAIT,
        })
    }

    /// Override the lock wait budget (tests exercise the `Busy` path
    /// with a short one).
    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Run `f` as a transaction: exclusive access for its whole
    /// duration, persisted on success.
    ///
    /// For file-backed tables the transaction holds the OS file lock
    /// and works on a fresh copy of the on-disk state, so concurrent
    /// processes serialize instead of clobbering each other.
    ///
    /// Closures must check first and mutate last: on error nothing is
    /// persisted.
    pub fn with_lock<R, E>(&self, f: impl FnOnce(&mut T) -> std::result::Result<R, E>) -> std::result::Result<R, E>
    where
        E: From<Error>,
    {
        let mut guard = self
            .inner
            .try_lock_for(self.lock_wait)
            .ok_or(Error::Busy(self.name))?;
        let file_lock = match &self.path {
            Some(path) => {
                let lock = self.acquire_file_lock(path, false)?;
                self.reload(path, &mut guard)?;
                Some(lock)
            }
            None => None,
        };
        let out = f(&mut guard)?;
        self.persist(&guard)?;
        drop(file_lock);
        Ok(out)
    }

    /// Read-only transaction: bounded-wait lock, no persist. File-backed
    /// tables take the shared file lock and re-read before answering.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let mut guard = self
            .inner
            .try_lock_for(self.lock_wait)
            .ok_or(Error::Busy(self.name))?;
        let _file_lock = match &self.path {
            Some(path) => {
                let lock = self.acquire_file_lock(path, true)?;
                self.reload(path, &mut guard)?;
                Some(lock)
            }
            None => None,
        };
        Ok(f(&guard))
    }

    /// Bounded-wait advisory lock on the table's sidecar `.lock` file.
    /// Released when the returned handle drops.
    fn acquire_file_lock(&self, path: &Path, shared: bool) -> Result<File> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.with_extension("lock"))
            .map_err(|e| self.storage_err(e))?;
        let deadline = Instant::now() + self.lock_wait;
        loop {
            let attempt = if shared {
                file.try_lock_shared()
            } else {
                file.try_lock()
            };
            match attempt {
                Ok(()) => return Ok(file),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    thread::sleep(LOCK_RETRY);
                }
                Err(TryLockError::WouldBlock) => return Err(Error::Busy(self.name)),
                Err(TryLockError::Error(e)) => return Err(self.storage_err(e)),
            }
        }
    }

    /// Refresh the in-memory copy from disk; another process may have
    /// persisted since this handle last looked. Only called under the
    /// file lock.
    fn reload(&self, path: &Path, value: &mut T) -> Result<()> {
        match fs::read(path) {
            Ok(bytes) => {
                *value = serde_json::from_slice(&bytes).map_err(|e| self.storage_err(e.into()))?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => *value = T::default(),
            Err(e) => return Err(self.storage_err(e)),
        }
        Ok(())
    }

    fn persist(&self, value: &T) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| self.storage_err(e.into()))?;
        // Write-then-rename so a reopening process never sees a
        // half-written table.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(|e| self.storage_err(e))?;
        fs::rename(&tmp, path).map_err(|e| self.storage_err(e))?;
        Ok(())
    }

    fn storage_err(&self, source: io::Error) -> Error {
        Error::Storage {
            table: self.name,
            source,
        }
    }
}

/// The four core tables, built once at the composition root and
/// injected into the components. No global paths anywhere.
pub struct Stores {
    pub tokens: Arc<Table<TokenTable>>,
    pub messages: Arc<Table<MessageTable>>,
    pub mailboxes: Arc<Table<MailboxTable>>,
    pub flags: Arc<Table<FlagTable>>,
}

impl Stores {
    /// All tables in memory. Used by tests and embedded callers.
    pub fn in_memory() -> Self {
        Self {
            tokens: Arc::new(Table::in_memory("tokens")),
            messages: Arc::new(Table::in_memory("messages")),
            mailboxes: Arc::new(Table::in_memory("mailboxes")),
            flags: Arc::new(Table::in_memory("flags")),
        }
    }

    /// File-backed tables under `dir`, one JSON document per table.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::Storage {
            table: "db",
            source: e,
        })?;
        Ok(Self {
            tokens: Arc::new(Table::open("tokens", dir.join("tokens.json"))?),
            messages: Arc::new(Table::open("messages", dir.join("messages.json"))?),
            mailboxes: Arc::new(Table::open("mailboxes", dir.join("mailboxes.json"))?),
            flags: Arc::new(Table::open("flags", dir.join("flags.json"))?),
        })
    }
}
