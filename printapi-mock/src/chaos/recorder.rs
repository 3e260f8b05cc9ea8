use std::{
    collections::VecDeque,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::behavior::{BehaviorStore, ChaosMode};

/// Amount of entries retained, older entries are evicted first.
pub const MAX_LOG_ENTRIES: usize = 200;

/// Status recorded for requests which were intentionally left unanswered.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// File attached to an upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub size: u64,
}

/// What the recorder needs to know about an incoming upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub path: String,
    pub attachment: Option<Attachment>,
    pub has_auth: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    /// RFC 3339 creation time
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub has_auth: bool,
    /// `0` in case no response was sent
    pub response_status: u16,
    pub note: Option<String>,
    pub chaos_mode: ChaosMode,
}

impl LogEntry {
    fn new(
        descriptor: RequestDescriptor,
        response_status: u16,
        note: Option<String>,
        chaos_mode: ChaosMode,
    ) -> Self {
        let now = SystemTime::now();
        let (file_name, file_size) = match descriptor.attachment {
            Some(Attachment { file_name, size }) => (Some(file_name), Some(size)),
            None => (None, None),
        };

        Self {
            id: new_entry_id(now),
            timestamp: humantime::format_rfc3339_millis(now).to_string(),
            method: descriptor.method,
            path: descriptor.path,
            file_name,
            file_size,
            has_auth: descriptor.has_auth,
            response_status,
            note,
            chaos_mode,
        }
    }
}

// unique enough to tell entries apart by eye, not meant as a real identifier
fn new_entry_id(now: SystemTime) -> String {
    let ts_ms = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix = rand::random::<u32>() & 0x00ff_ffff;
    format!("{ts_ms:x}-{suffix:06x}")
}

/// Bounded, newest-first log of the upload requests received.
#[derive(Debug, Clone)]
pub struct RequestLog {
    behavior: BehaviorStore,
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl RequestLog {
    /// Create an empty log which tags each entry
    /// with the mode active in `behavior` at record time.
    pub fn new(behavior: BehaviorStore) -> Self {
        Self {
            behavior,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES))),
        }
    }

    /// Record the outcome of a single upload request.
    pub fn record(
        &self,
        descriptor: RequestDescriptor,
        response_status: u16,
        note: Option<String>,
    ) -> LogEntry {
        let entry = LogEntry::new(descriptor, response_status, note, self.behavior.mode());

        let mut entries = self.entries.lock();
        entries.push_front(entry.clone());
        entries.truncate(MAX_LOG_ENTRIES);

        entry
    }

    /// Copy of all retained entries, newest first.
    pub fn list(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
