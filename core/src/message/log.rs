// Message log storage — append-only buffer with cheap prefix snapshots
//
// Entries are never removed or reordered, so a snapshot is the shared buffer
// plus the length at the time it was taken. Appending never copies existing
// entries, and every append yields a new, distinct snapshot value.

use super::types::Message;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

type Entries = Arc<RwLock<Vec<Arc<Message>>>>;

/// Writer side of the log; owned by the bus
#[derive(Default)]
pub struct MessageLog {
    entries: Entries,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the snapshot that includes the new entry
    pub fn append(&self, message: Message) -> LogSnapshot {
        let mut entries = self.entries.write();
        entries.push(Arc::new(message));
        LogSnapshot {
            entries: Arc::clone(&self.entries),
            len: entries.len(),
        }
    }

    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            entries: Arc::clone(&self.entries),
            len: self.entries.read().len(),
        }
    }
}

/// The first `len` messages of the log, in append order
#[derive(Clone)]
pub struct LogSnapshot {
    entries: Entries,
    len: usize,
}

impl LogSnapshot {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<Arc<Message>> {
        if index >= self.len {
            return None;
        }
        self.entries.read().get(index).cloned()
    }

    pub fn last(&self) -> Option<Arc<Message>> {
        self.len.checked_sub(1).and_then(|index| self.get(index))
    }

    pub fn to_vec(&self) -> Vec<Arc<Message>> {
        self.entries.read()[..self.len].to_vec()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Arc<Message>> {
        self.to_vec().into_iter()
    }
}

impl PartialEq for LogSnapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries) && self.len == other.len
    }
}

impl fmt::Debug for LogSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}
