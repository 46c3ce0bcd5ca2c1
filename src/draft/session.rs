//! Draft editing session.
//!
//! [`DraftSession`] owns the working copy of one case draft and mediates
//! every mutation path: local edits, manual save, autosave, externally
//! generated content arriving mid-session, template application, citation
//! insertion, restore, comments, and change tracking. Every path routes
//! through the sanitizer before its result becomes current content; the
//! discrete operations then persist the aggregate.
//!
//! Concurrency model: one session instance per case per context, with all
//! mutations serialized. [`spawn`] wraps a session in a task that owns it
//! outright — commands arrive over a channel, the autosave interval ticks
//! inside the same loop, and save notices from other sessions fold into
//! display state — so no two mutations can interleave. Across contexts the
//! only coordination is the durable store plus the save bus: last local
//! write wins on the stored aggregate, and a notice from another session
//! updates save-status display only, never content.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::config::DraftConfig;
use crate::draft::changes::ChangeTracker;
use crate::draft::comments::CommentSet;
use crate::draft::history::VersionHistory;
use crate::draft::sanitize::sanitize;
use crate::draft::{ChangeKind, Comment, DraftState, SaveReason};
use crate::error::SessionClosed;
use crate::notify::{SaveBus, SaveNotice};
use crate::store::DraftStore;

/// Upper bound on waiting for the external save callback. The UI keeps
/// working either way; a slow remote degrades to a visible notice.
const REMOTE_SAVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Externally supplied remote-persistence hook invoked on manual save.
/// Optional: local persistence happens whether or not one is wired in.
pub type RemoteSaveFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Where the session is in its lifecycle. The time before [`DraftSession::open`]
/// resolves is the uninitialized stage; a constructed session starts at
/// `Loaded` and moves to `Editing` on the first local mutation. Teardown is
/// dropping the session (or shutting down its driver), not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loaded,
    Editing,
}

/// Non-blocking save indicator surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    /// This session's own most recent save.
    Saved { at: DateTime<Utc> },
    /// Local persistence failed; editing continues in memory.
    PersistFailed { at: DateTime<Utc> },
    /// The external save callback rejected or timed out.
    RemoteFailed { message: String },
    /// Another session of the same case announced a manual save.
    CollaboratorSaved { at: DateTime<Utc> },
}

/// One observed edit delta, reported by the editing surface alongside the
/// new content.
#[derive(Debug, Clone)]
pub struct EditDelta {
    pub kind: ChangeKind,
    pub text: String,
}

pub struct DraftSession {
    session_id: Uuid,
    case_id: String,
    store: Arc<dyn DraftStore>,
    bus: SaveBus,
    remote_save: Option<RemoteSaveFn>,
    autosave_interval: Duration,
    content: String,
    /// Last externally imported content already reconciled against; used to
    /// suppress duplicate import-triggered versions.
    baseline: String,
    history: VersionHistory,
    comments: CommentSet,
    changes: ChangeTracker,
    last_saved_at: Option<DateTime<Utc>>,
    phase: SessionPhase,
    status: SaveStatus,
}

impl DraftSession {
    /// Open a session for one case: adopt the stored aggregate when one
    /// exists, otherwise seed from the externally supplied initial content.
    /// A store failure degrades to the fresh-draft path; it never blocks
    /// editing.
    pub async fn open(
        case_id: impl Into<String>,
        initial_content: &str,
        store: Arc<dyn DraftStore>,
        bus: SaveBus,
        config: &DraftConfig,
        remote_save: Option<RemoteSaveFn>,
    ) -> Self {
        let case_id = case_id.into();
        let stored = match store.load(&case_id).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(case_id = %case_id, "failed to load stored draft: {e}");
                None
            }
        };

        let (content, history, comments, changes, last_saved_at) = match stored {
            Some(state) => (
                sanitize(&state.content),
                VersionHistory::from_snapshots(config.history_limit, state.history),
                CommentSet::from_comments(state.comments),
                ChangeTracker::from_entries(config.changelog_limit, state.change_log),
                state.last_saved_at,
            ),
            None => (
                sanitize(initial_content),
                VersionHistory::new(config.history_limit),
                CommentSet::new(),
                ChangeTracker::new(config.changelog_limit),
                None,
            ),
        };

        Self {
            session_id: Uuid::new_v4(),
            case_id,
            store,
            bus,
            remote_save,
            autosave_interval: config.autosave_interval,
            baseline: content.clone(),
            content,
            history,
            comments,
            changes,
            last_saved_at,
            phase: SessionPhase::Loaded,
            status: SaveStatus::Idle,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    pub fn comments(&self) -> &CommentSet {
        &self.comments
    }

    pub fn change_tracker(&self) -> &ChangeTracker {
        &self.changes
    }

    /// A local edit from the editing surface. Not persisted on its own; the
    /// autosave tick or the next save picks it up.
    pub fn apply_edit(&mut self, new_content: &str, delta: Option<EditDelta>) {
        self.content = sanitize(new_content);
        self.phase = SessionPhase::Editing;
        if let Some(delta) = delta {
            self.changes.record(delta.kind, &delta.text, Utc::now());
        }
    }

    /// Reconcile freshly generated content arriving from outside the
    /// session. Unchanged-from-baseline input is ignored so upstream
    /// re-emissions of the same generation cannot flood history with
    /// identical snapshots. Returns whether the content was adopted.
    pub async fn import_external(&mut self, new_content: &str) -> bool {
        let sanitized = sanitize(new_content);
        if sanitized == self.baseline {
            return false;
        }
        self.history
            .record(SaveReason::Ai, &sanitized, Utc::now());
        self.content = sanitized.clone();
        self.baseline = sanitized;
        self.persist().await;
        true
    }

    /// Snapshot unsaved edits, if any. Local-only: autosaves never
    /// broadcast. Returns whether a version was recorded.
    pub async fn autosave_tick(&mut self) -> bool {
        if !self.has_unsnapshotted_edits() {
            return false;
        }
        let saved_at = Utc::now();
        self.history
            .record(SaveReason::Auto, &self.content, saved_at);
        self.last_saved_at = Some(saved_at);
        self.persist().await;
        true
    }

    /// Manual save: snapshot, persist, invoke the optional remote callback,
    /// then announce the save to other sessions of this case. The content
    /// is captured at invocation time so edits made while the callback is
    /// in flight cannot tear the saved value.
    pub async fn save(&mut self) -> SaveStatus {
        let content = self.content.clone();
        let saved_at = Utc::now();
        self.history.record(SaveReason::Manual, &content, saved_at);
        self.last_saved_at = Some(saved_at);
        self.status = SaveStatus::Saved { at: saved_at };
        self.persist().await;

        if let Some(remote_save) = self.remote_save.clone() {
            match tokio::time::timeout(REMOTE_SAVE_TIMEOUT, remote_save(content)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(case_id = %self.case_id, "remote save failed: {e:#}");
                    self.status = SaveStatus::RemoteFailed {
                        message: e.to_string(),
                    };
                }
                Err(_) => {
                    tracing::warn!(case_id = %self.case_id, "remote save timed out");
                    self.status = SaveStatus::RemoteFailed {
                        message: "remote save timed out".to_string(),
                    };
                }
            }
        }

        self.bus.publish(&self.case_id, saved_at, self.session_id);
        self.status.clone()
    }

    /// Install a historical snapshot as current content. Unknown ids are a
    /// no-op (history may have been evicted under a stale reference).
    /// Restoring does not itself record a version; the next save snapshots
    /// the restored content.
    pub async fn restore(&mut self, version_id: Uuid) -> bool {
        let Some(content) = self.history.restore(version_id).map(str::to_string) else {
            return false;
        };
        self.content = content;
        self.phase = SessionPhase::Editing;
        self.persist().await;
        true
    }

    /// Replace the draft with a drafting template's body. Treated as a user
    /// edit: no automatic snapshot; the user saves when satisfied.
    pub async fn apply_template(&mut self, template_html: &str) {
        self.content = sanitize(template_html);
        self.phase = SessionPhase::Editing;
        self.persist().await;
    }

    /// Append an evidence-citation anchor to the draft.
    pub async fn insert_citation(&mut self, citation_id: &str, label: &str) {
        let addition = format!(
            r#"<p><span class="citation" data-citation-id="{citation_id}">{label}</span></p>"#
        );
        let combined = format!("{}{addition}", self.content);
        self.content = sanitize(&combined);
        self.phase = SessionPhase::Editing;
        self.persist().await;
    }

    pub async fn add_comment(&mut self, anchor_text: &str, body: &str) -> Comment {
        let comment = self.comments.add(anchor_text, body, Utc::now());
        self.persist().await;
        comment
    }

    pub async fn toggle_comment_resolved(&mut self, comment_id: Uuid) -> bool {
        let changed = self.comments.toggle_resolved(comment_id);
        if changed {
            self.persist().await;
        }
        changed
    }

    pub fn set_change_tracking(&mut self, enabled: bool) {
        if enabled {
            self.changes.enable();
        } else {
            self.changes.disable();
        }
    }

    /// Fold a save announcement from another session into display state.
    /// Own notices and other cases' notices are ignored; content is never
    /// touched from here.
    pub fn note_collaborator_save(&mut self, notice: &SaveNotice) {
        if notice.origin == self.session_id || notice.case_id != self.case_id {
            return;
        }
        self.status = SaveStatus::CollaboratorSaved {
            at: notice.saved_at,
        };
    }

    /// The persisted aggregate for this session's current state.
    pub fn to_state(&self) -> DraftState {
        DraftState {
            content: self.content.clone(),
            history: self.history.to_vec(),
            last_saved_at: self.last_saved_at,
            comments: self.comments.to_vec(),
            change_log: self.changes.to_vec(),
        }
    }

    fn has_unsnapshotted_edits(&self) -> bool {
        match self.history.latest() {
            Some(snapshot) => snapshot.content != self.content,
            None => self.content != self.baseline,
        }
    }

    async fn persist(&mut self) {
        let state = self.to_state();
        if let Err(e) = self.store.save(&self.case_id, &state).await {
            // Editing continues in memory; durability resumes on the next
            // successful write.
            tracing::warn!(case_id = %self.case_id, "failed to persist draft: {e}");
            self.status = SaveStatus::PersistFailed { at: Utc::now() };
        }
    }
}

// --- Session driver ---

/// Mutations and queries accepted by a driven session.
pub enum SessionCommand {
    Edit {
        content: String,
        delta: Option<EditDelta>,
    },
    ImportExternal {
        content: String,
    },
    Save {
        reply: oneshot::Sender<SaveStatus>,
    },
    Restore {
        version_id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    ApplyTemplate {
        content: String,
    },
    InsertCitation {
        citation_id: String,
        label: String,
    },
    AddComment {
        anchor_text: String,
        body: String,
        reply: oneshot::Sender<Comment>,
    },
    ToggleCommentResolved {
        comment_id: Uuid,
    },
    SetChangeTracking {
        enabled: bool,
    },
    Snapshot {
        reply: oneshot::Sender<DraftState>,
    },
    Status {
        reply: oneshot::Sender<SaveStatus>,
    },
    Shutdown,
}

/// Cheap cloneable handle to a driven session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    session_id: Uuid,
    case_id: String,
}

/// Move the session onto its own task: commands, the autosave interval, and
/// incoming save notices are all serialized through one event loop, which is
/// what guarantees no two mutations interleave.
pub fn spawn(session: DraftSession) -> SessionHandle {
    let (tx, rx) = mpsc::channel(32);
    let handle = SessionHandle {
        tx,
        session_id: session.session_id,
        case_id: session.case_id.clone(),
    };
    // Subscribe before the task starts so a save announced by another
    // session right after spawn cannot slip past an unsubscribed loop.
    let notices = session.bus.subscribe(&session.case_id);
    tokio::spawn(run_session(session, rx, notices));
    handle
}

async fn run_session(
    mut session: DraftSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut notices: broadcast::Receiver<SaveNotice>,
) {
    let mut notices_open = true;
    let mut autosave = tokio::time::interval(session.autosave_interval);
    autosave.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first interval tick completes immediately; consume it so the
    // first real check happens one full interval after open.
    autosave.tick().await;

    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(command) => {
                        if handle_command(&mut session, command).await.is_break() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = autosave.tick() => {
                session.autosave_tick().await;
            }
            notice = notices.recv(), if notices_open => {
                match notice {
                    Ok(notice) => session.note_collaborator_save(&notice),
                    // Skipped notices are acceptable: delivery is
                    // at-most-once and only display state rides on it.
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => notices_open = false,
                }
            }
        }
    }
}

async fn handle_command(
    session: &mut DraftSession,
    command: SessionCommand,
) -> std::ops::ControlFlow<()> {
    match command {
        SessionCommand::Edit { content, delta } => session.apply_edit(&content, delta),
        SessionCommand::ImportExternal { content } => {
            session.import_external(&content).await;
        }
        SessionCommand::Save { reply } => {
            let _ = reply.send(session.save().await);
        }
        SessionCommand::Restore { version_id, reply } => {
            let _ = reply.send(session.restore(version_id).await);
        }
        SessionCommand::ApplyTemplate { content } => session.apply_template(&content).await,
        SessionCommand::InsertCitation { citation_id, label } => {
            session.insert_citation(&citation_id, &label).await;
        }
        SessionCommand::AddComment {
            anchor_text,
            body,
            reply,
        } => {
            let _ = reply.send(session.add_comment(&anchor_text, &body).await);
        }
        SessionCommand::ToggleCommentResolved { comment_id } => {
            session.toggle_comment_resolved(comment_id).await;
        }
        SessionCommand::SetChangeTracking { enabled } => session.set_change_tracking(enabled),
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(session.to_state());
        }
        SessionCommand::Status { reply } => {
            let _ = reply.send(session.status().clone());
        }
        SessionCommand::Shutdown => return std::ops::ControlFlow::Break(()),
    }
    std::ops::ControlFlow::Continue(())
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub async fn edit(
        &self,
        content: impl Into<String>,
        delta: Option<EditDelta>,
    ) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Edit {
            content: content.into(),
            delta,
        })
        .await
    }

    pub async fn import_external(&self, content: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::ImportExternal {
            content: content.into(),
        })
        .await
    }

    pub async fn save(&self) -> Result<SaveStatus, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Save { reply }).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn restore(&self, version_id: Uuid) -> Result<bool, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Restore { version_id, reply })
            .await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn apply_template(&self, content: impl Into<String>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::ApplyTemplate {
            content: content.into(),
        })
        .await
    }

    pub async fn insert_citation(
        &self,
        citation_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<(), SessionClosed> {
        self.send(SessionCommand::InsertCitation {
            citation_id: citation_id.into(),
            label: label.into(),
        })
        .await
    }

    pub async fn add_comment(
        &self,
        anchor_text: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Comment, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::AddComment {
            anchor_text: anchor_text.into(),
            body: body.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn toggle_comment_resolved(&self, comment_id: Uuid) -> Result<(), SessionClosed> {
        self.send(SessionCommand::ToggleCommentResolved { comment_id })
            .await
    }

    pub async fn set_change_tracking(&self, enabled: bool) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetChangeTracking { enabled })
            .await
    }

    pub async fn snapshot(&self) -> Result<DraftState, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn status(&self) -> Result<SaveStatus, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Status { reply }).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.tx.send(command).await.map_err(|_| SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use crate::store::memory::MemoryBackend;

    use super::*;

    fn test_config() -> DraftConfig {
        DraftConfig {
            autosave_interval: Duration::from_secs(1),
            ..DraftConfig::default()
        }
    }

    async fn open_session(store: Arc<dyn DraftStore>, bus: SaveBus) -> DraftSession {
        DraftSession::open(
            "case-1",
            "<p>Hello</p>",
            store,
            bus,
            &test_config(),
            None,
        )
        .await
    }

    /// Store whose writes always fail, for persistence-degradation tests.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl DraftStore for BrokenStore {
        async fn load(&self, _case_id: &str) -> Result<Option<DraftState>, crate::error::StoreError> {
            Ok(None)
        }

        async fn save(
            &self,
            _case_id: &str,
            _state: &DraftState,
        ) -> Result<(), crate::error::StoreError> {
            Err(crate::error::StoreError::Query("disk full".to_string()))
        }

        async fn delete(&self, _case_id: &str) -> Result<(), crate::error::StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn open_without_stored_state_seeds_sanitized_initial_content() {
        let session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        assert_eq!(session.content(), "<p>Hello</p>");
        assert!(session.history().is_empty());
        assert_eq!(session.last_saved_at(), None);
        assert_eq!(session.phase(), SessionPhase::Loaded);
    }

    #[tokio::test]
    async fn open_adopts_stored_aggregate_over_initial_content() {
        let store = Arc::new(MemoryBackend::new());
        let mut first = open_session(store.clone(), SaveBus::new()).await;
        first.apply_edit("<p>Edited locally</p>", None);
        first.save().await;

        let second = open_session(store, SaveBus::new()).await;
        assert_eq!(second.content(), "<p>Edited locally</p>");
        assert_eq!(second.history().len(), 1);
        assert!(second.last_saved_at().is_some());
    }

    #[tokio::test]
    async fn open_survives_a_failing_store_load() {
        struct BrokenLoad;

        #[async_trait::async_trait]
        impl DraftStore for BrokenLoad {
            async fn load(
                &self,
                _case_id: &str,
            ) -> Result<Option<DraftState>, crate::error::StoreError> {
                Err(crate::error::StoreError::Query("corrupt".to_string()))
            }

            async fn save(
                &self,
                _case_id: &str,
                _state: &DraftState,
            ) -> Result<(), crate::error::StoreError> {
                Ok(())
            }

            async fn delete(&self, _case_id: &str) -> Result<(), crate::error::StoreError> {
                Ok(())
            }
        }

        let session = DraftSession::open(
            "case-1",
            "fallback text",
            Arc::new(BrokenLoad),
            SaveBus::new(),
            &test_config(),
            None,
        )
        .await;
        assert_eq!(session.content(), "<p>fallback text</p>");
    }

    #[tokio::test]
    async fn manual_save_without_remote_callback_still_persists() {
        let store = Arc::new(MemoryBackend::new());
        let mut session = open_session(store.clone(), SaveBus::new()).await;

        let status = session.save().await;

        assert!(matches!(status, SaveStatus::Saved { .. }));
        assert_eq!(session.history().len(), 1);
        assert_eq!(
            session.history().latest().map(|s| s.reason),
            Some(SaveReason::Manual)
        );
        let stored = store
            .load("case-1")
            .await
            .expect("load")
            .expect("persisted state");
        assert_eq!(stored.content, "<p>Hello</p>");
    }

    #[tokio::test]
    async fn manual_save_invokes_remote_callback_with_captured_content() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let remote: RemoteSaveFn = Arc::new(move |content: String| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().expect("lock").push(content);
                Ok(())
            })
        });

        let mut session = DraftSession::open(
            "case-1",
            "<p>Hello</p>",
            Arc::new(MemoryBackend::new()),
            SaveBus::new(),
            &test_config(),
            Some(remote),
        )
        .await;
        session.apply_edit("<p>Revised</p>", None);
        session.save().await;

        assert_eq!(
            seen.lock().expect("lock").as_slice(),
            ["<p>Revised</p>".to_string()]
        );
    }

    #[tokio::test]
    async fn remote_save_failure_is_caught_and_editing_continues() {
        let remote: RemoteSaveFn = Arc::new(|_content: String| {
            Box::pin(async { Err(anyhow::anyhow!("backend unavailable")) })
        });
        let store = Arc::new(MemoryBackend::new());
        let mut session = DraftSession::open(
            "case-1",
            "<p>Hello</p>",
            store.clone(),
            SaveBus::new(),
            &test_config(),
            Some(remote),
        )
        .await;

        let status = session.save().await;

        assert!(matches!(status, SaveStatus::RemoteFailed { .. }));
        // Local persistence happened despite the remote failure.
        assert!(store.load("case-1").await.expect("load").is_some());
        // Editing still works.
        session.apply_edit("<p>Still editing</p>", None);
        assert_eq!(session.content(), "<p>Still editing</p>");
    }

    #[tokio::test]
    async fn persistence_failure_is_swallowed_into_status() {
        let mut session = DraftSession::open(
            "case-1",
            "<p>Hello</p>",
            Arc::new(BrokenStore),
            SaveBus::new(),
            &test_config(),
            None,
        )
        .await;

        let status = session.save().await;

        assert!(matches!(status, SaveStatus::PersistFailed { .. }));
        assert_eq!(session.history().len(), 1);
        session.apply_edit("<p>Onward</p>", None);
        assert_eq!(session.content(), "<p>Onward</p>");
    }

    #[tokio::test]
    async fn duplicate_external_import_records_a_single_ai_version() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        assert!(session.import_external("<p>Generated v2</p>").await);
        assert!(!session.import_external("<p>Generated v2</p>").await);

        assert_eq!(session.history().len(), 1);
        assert_eq!(
            session.history().latest().map(|s| s.reason),
            Some(SaveReason::Ai)
        );
        assert_eq!(session.content(), "<p>Generated v2</p>");
    }

    #[tokio::test]
    async fn external_import_matching_the_initial_baseline_is_ignored() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        assert!(!session.import_external("<p>Hello</p>").await);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn local_edits_survive_a_matching_reimport() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;
        session.apply_edit("<p>Hello, edited</p>", None);

        // The generator re-emits the unchanged baseline; the local edit must
        // not be clobbered.
        assert!(!session.import_external("<p>Hello</p>").await);
        assert_eq!(session.content(), "<p>Hello, edited</p>");
    }

    #[tokio::test]
    async fn autosave_records_one_version_per_dirty_interval() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        session.apply_edit("<p>Draft in progress</p>", None);
        assert!(session.autosave_tick().await);
        assert_eq!(
            session.history().latest().map(|s| s.reason),
            Some(SaveReason::Auto)
        );

        // Unchanged content: the next tick records nothing.
        assert!(!session.autosave_tick().await);
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn autosave_without_edits_records_nothing() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;
        assert!(!session.autosave_tick().await);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn restore_installs_snapshot_content_and_persists() {
        let store = Arc::new(MemoryBackend::new());
        let mut session = open_session(store.clone(), SaveBus::new()).await;
        session.save().await;
        let version_id = session
            .history()
            .latest()
            .expect("snapshot present")
            .id;
        session.apply_edit("<p>Heavily rewritten</p>", None);

        assert!(session.restore(version_id).await);

        assert_eq!(session.content(), "<p>Hello</p>");
        // Restore itself records no version.
        assert_eq!(session.history().len(), 1);
        let stored = store
            .load("case-1")
            .await
            .expect("load")
            .expect("persisted");
        assert_eq!(stored.content, "<p>Hello</p>");
    }

    #[tokio::test]
    async fn restore_of_unknown_version_is_a_noop() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;
        session.apply_edit("<p>Current</p>", None);

        assert!(!session.restore(Uuid::new_v4()).await);
        assert_eq!(session.content(), "<p>Current</p>");
    }

    #[tokio::test]
    async fn tracked_deltas_are_recorded_only_while_enabled() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        session.apply_edit(
            "<p>Hello there</p>",
            Some(EditDelta {
                kind: ChangeKind::Insert,
                text: " there".to_string(),
            }),
        );
        assert!(session.change_tracker().is_empty());

        session.set_change_tracking(true);
        session.apply_edit(
            "<p>Hello there, counsel</p>",
            Some(EditDelta {
                kind: ChangeKind::Insert,
                text: ", counsel".to_string(),
            }),
        );
        assert_eq!(session.change_tracker().len(), 1);
    }

    #[tokio::test]
    async fn comments_round_trip_through_the_session() {
        let store = Arc::new(MemoryBackend::new());
        let mut session = open_session(store.clone(), SaveBus::new()).await;

        let comment = session.add_comment("Hello", "Too informal.").await;
        assert!(session.toggle_comment_resolved(comment.id).await);
        assert!(!session.toggle_comment_resolved(Uuid::new_v4()).await);

        let stored = store
            .load("case-1")
            .await
            .expect("load")
            .expect("persisted");
        assert_eq!(stored.comments.len(), 1);
        assert!(stored.comments[0].resolved);
    }

    #[tokio::test]
    async fn collaborator_notice_updates_status_but_never_content() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;
        session.apply_edit("<p>Local work</p>", None);

        let saved_at = Utc::now();
        session.note_collaborator_save(&SaveNotice {
            case_id: "case-1".to_string(),
            saved_at,
            origin: Uuid::new_v4(),
        });

        assert_eq!(session.content(), "<p>Local work</p>");
        assert_eq!(*session.status(), SaveStatus::CollaboratorSaved { at: saved_at });
    }

    #[tokio::test]
    async fn own_notices_and_other_cases_are_ignored() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        session.note_collaborator_save(&SaveNotice {
            case_id: "case-1".to_string(),
            saved_at: Utc::now(),
            origin: session.session_id(),
        });
        session.note_collaborator_save(&SaveNotice {
            case_id: "case-2".to_string(),
            saved_at: Utc::now(),
            origin: Uuid::new_v4(),
        });

        assert_eq!(*session.status(), SaveStatus::Idle);
    }

    #[tokio::test]
    async fn citation_insertion_appends_an_anchored_span() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        session.insert_citation("ev-42", "Exhibit 42 at 3").await;

        assert_eq!(
            session.content(),
            "<p>Hello</p><p><span class=\"citation\" data-citation-id=\"ev-42\">Exhibit 42 at 3</span></p>"
        );
    }

    #[tokio::test]
    async fn template_application_replaces_content_through_the_sanitizer() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        session
            .apply_template("<h2 onclick=\"x()\">MOTION TO DISMISS</h2><p>Now comes…</p>")
            .await;

        assert_eq!(
            session.content(),
            "<h2>MOTION TO DISMISS</h2><p>Now comes…</p>"
        );
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn history_bound_holds_across_mixed_save_reasons() {
        let mut session = open_session(Arc::new(MemoryBackend::new()), SaveBus::new()).await;

        for i in 0..7 {
            session.apply_edit(&format!("<p>rev {i}</p>"), None);
            session.save().await;
        }
        for i in 0..7 {
            session
                .import_external(&format!("<p>generated {i}</p>"))
                .await;
        }

        assert_eq!(session.history().len(), 10);
        let reasons: Vec<_> = session.history().iter().map(|s| s.reason).collect();
        assert_eq!(&reasons[7..], &[SaveReason::Ai, SaveReason::Ai, SaveReason::Ai]);
    }
}
