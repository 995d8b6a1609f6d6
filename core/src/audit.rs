//! Append-only audit trail.
//!
//! Every sensitive action gets recorded through [`AuditSink`].
//! Recording never fails from the caller's side: a broken sink costs
//! observability, not correctness, so write failures degrade to a
//! `tracing` warning and the business operation carries on.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;
use whisper_common::audit::AuditEvent;

/// Where sensitive actions get recorded.
pub trait AuditSink: Send + Sync {
    fn record(&self, event_type: &str, data: Value);
}

/// Sink appending events to a JSON-lines file, one event per line.
pub struct JsonAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Events matching the given filters, oldest first. Lines that do
    /// not parse are skipped; a missing file is an empty trail.
    pub fn events(
        &self,
        event_type: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Vec<AuditEvent> {
        let _guard = self.lock.lock();
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        contents
            .lines()
            .filter_map(|line| serde_json::from_str::<AuditEvent>(line).ok())
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .filter(|e| since.is_none_or(|t| e.timestamp >= t))
            .filter(|e| until.is_none_or(|t| e.timestamp <= t))
            .collect()
    }
}

impl AuditSink for JsonAuditLog {
    fn record(&self, event_type: &str, data: Value) {
        let event = AuditEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
        };
        let _guard = self.lock.lock();
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                let mut line = serde_json::to_vec(&event)?;
                line.push(b'\n');
                file.write_all(&line)
            });
        if let Err(error) = result {
            warn!(%error, path = %self.path.display(), "audit write failed, event dropped");
        }
    }
}

/// In-memory sink for tests and embedded callers.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event_type: &str, data: Value) {
        self.events.lock().push(AuditEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
        });
    }
}
