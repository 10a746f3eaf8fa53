//! Per-learner serialization of read-modify-write actions.
//!
//! Two concurrent actions of the same learner (e.g. two quiz submissions)
//! would otherwise both read the same balance and streak and one write would
//! be lost. Actions of different learners never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct LearnerLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl LearnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other action holds `learner_id`. The returned guard
    /// releases the learner when dropped.
    pub async fn acquire(&self, learner_id: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop slots nobody is holding or waiting on.
            slots.retain(|id, slot| *id == learner_id || Arc::strong_count(slot) > 1);
            slots.entry(learner_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Number of learners currently tracked.
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
