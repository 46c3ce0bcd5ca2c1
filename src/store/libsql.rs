//! Embedded libSQL backend.

use std::path::Path;

use chrono::Utc;
use libsql::params;

use crate::draft::DraftState;
use crate::error::StoreError;

use super::{DraftStore, draft_key};

pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    /// Open (creating if needed) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("create {parent:?}: {e}")))?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { db })
    }

    pub async fn connect(&self) -> Result<libsql::Connection, StoreError> {
        self.db
            .connect()
            .map_err(|e| StoreError::Open(e.to_string()))
    }

    /// Create the drafts table if this is a fresh database.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.connect().await?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS drafts ( \
               case_key TEXT PRIMARY KEY, \
               state TEXT NOT NULL, \
               updated_at TEXT NOT NULL \
             )",
            (),
        )
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DraftStore for LibSqlBackend {
    async fn load(&self, case_id: &str) -> Result<Option<DraftState>, StoreError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                "SELECT state FROM drafts WHERE case_key = ?1 LIMIT 1",
                params![draft_key(case_id)],
            )
            .await?
            .next()
            .await?;

        match row {
            Some(row) => {
                let raw = row
                    .get::<String>(0)
                    .map_err(|e| StoreError::Query(e.to_string()))?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, case_id: &str, state: &DraftState) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(state)?;
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO drafts (case_key, state, updated_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(case_key) DO UPDATE SET \
               state = excluded.state, \
               updated_at = excluded.updated_at",
            params![draft_key(case_id), serialized, Utc::now().to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, case_id: &str) -> Result<(), StoreError> {
        let conn = self.connect().await?;
        conn.execute(
            "DELETE FROM drafts WHERE case_key = ?1",
            params![draft_key(case_id)],
        )
        .await?;
        Ok(())
    }
}
