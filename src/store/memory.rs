//! In-memory backend.
//!
//! The simplest conforming [`DraftStore`]: a mutexed map keyed like the
//! durable backends. Used by tests and by embedders that explicitly opt out
//! of durability.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::draft::DraftState;
use crate::error::StoreError;

use super::{DraftStore, draft_key};

#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, DraftState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DraftStore for MemoryBackend {
    async fn load(&self, case_id: &str) -> Result<Option<DraftState>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Query(format!("state lock poisoned: {e}")))?;
        Ok(entries.get(&draft_key(case_id)).cloned())
    }

    async fn save(&self, case_id: &str, state: &DraftState) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Query(format!("state lock poisoned: {e}")))?;
        entries.insert(draft_key(case_id), state.clone());
        Ok(())
    }

    async fn delete(&self, case_id: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Query(format!("state lock poisoned: {e}")))?;
        entries.remove(&draft_key(case_id));
        Ok(())
    }
}
