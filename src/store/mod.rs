//! Durable draft storage.
//!
//! Provides a backend-agnostic [`DraftStore`] trait over the persisted
//! per-case aggregate. Two implementations exist:
//!
//! - `libsql` (default feature): embedded libSQL database file
//! - `memory`: process-local map, for tests and non-durable environments
//!
//! One JSON aggregate is stored per case key; the key is derived from the
//! case identifier so unsafe identifier characters never reach the backend.

#[cfg(feature = "libsql")]
pub mod libsql;

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{DraftConfig, StoreBackend};
use crate::draft::DraftState;
use crate::error::StoreError;

/// Backend-agnostic persistence seam for draft aggregates.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Load the stored aggregate for a case, `None` when no prior state
    /// exists under the identifier.
    async fn load(&self, case_id: &str) -> Result<Option<DraftState>, StoreError>;

    /// Persist the aggregate, replacing any prior state for the case.
    async fn save(&self, case_id: &str, state: &DraftState) -> Result<(), StoreError>;

    /// Discard the stored aggregate for a case. Absent state is not an
    /// error.
    async fn delete(&self, case_id: &str) -> Result<(), StoreError>;
}

/// Create a store backend from configuration and return it ready for use.
pub async fn connect_from_config(config: &DraftConfig) -> Result<Arc<dyn DraftStore>, StoreError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        StoreBackend::LibSql => {
            let backend = libsql::LibSqlBackend::new_local(&config.libsql_path).await?;
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
        StoreBackend::Memory => Ok(Arc::new(memory::MemoryBackend::new())),
    }
}

/// Keep case keys filesystem- and SQL-safe and deterministic.
pub fn draft_key(case_id: &str) -> String {
    case_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
