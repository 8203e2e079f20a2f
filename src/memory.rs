use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Bounded per-context conversation history, shared between the scheduler and
/// concurrent on-demand requests. One lock serializes appends so FIFO order
/// and eviction stay consistent; the lock is never held across an await.
pub struct ConversationMemory {
    capacity: usize,
    contexts: Mutex<HashMap<i64, VecDeque<String>>>,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            // A zero capacity would silently drop everything; clamp it.
            capacity: capacity.max(1),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `text` at the tail of the context's history, evicting the
    /// oldest entry when the bound would be exceeded. Entries are never
    /// mutated after insertion.
    pub fn append(&self, context_id: i64, text: impl Into<String>) {
        let mut contexts = match self.contexts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entries = contexts.entry(context_id).or_default();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(text.into());
    }

    /// Current history for a context, oldest first. Unknown contexts read as empty.
    pub fn snapshot(&self, context_id: i64) -> Vec<String> {
        let contexts = match self.contexts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        contexts
            .get(&context_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}
