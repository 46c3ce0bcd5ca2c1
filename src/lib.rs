//! Draft versioning and synchronization engine for legal case files.
//!
//! One [`draft::session::DraftSession`] per case identifier per context owns
//! the working copy of a draft: sanitized content, a bounded version
//! history, tracked changes, inline comments, and autosave scheduling. The
//! aggregate persists to a durable per-case store ([`store::DraftStore`],
//! embedded libSQL by default), and manual saves are announced to other
//! sessions of the same case over the [`notify::SaveBus`]. Across contexts
//! there is no merge: the stored aggregate is last-local-write-wins, and a
//! save notice only ever updates display state.

pub mod config;
pub mod draft;
pub mod error;
pub mod notify;
pub mod store;

pub use config::{DraftConfig, StoreBackend};
pub use draft::session::{
    DraftSession, EditDelta, RemoteSaveFn, SaveStatus, SessionHandle, SessionPhase, spawn,
};
pub use draft::{
    ChangeEntry, ChangeKind, Comment, DraftState, SaveReason, VersionSnapshot,
    sanitize::sanitize,
};
pub use error::{ConfigError, SessionClosed, StoreError};
pub use notify::{SaveBus, SaveNotice};
pub use store::{DraftStore, connect_from_config};
