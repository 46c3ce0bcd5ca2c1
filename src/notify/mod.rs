//! Cross-session save notifications.
//!
//! A process-level publish/subscribe bus, one broadcast channel per case
//! identifier, so concurrently open sessions editing the same case can
//! observe each other's manual saves without a server round-trip. Delivery
//! is at-most-once: there is no replay for late subscribers, publishing with
//! no subscribers is a silent no-op, and a lagged receiver loses the oldest
//! notices rather than blocking the publisher. A received notice only ever
//! updates save-status display state; it never carries or overwrites
//! content.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Per-channel buffer. Saves are rare and receivers drain promptly; a small
/// buffer keeps lag losses to pathological subscribers.
const CHANNEL_CAPACITY: usize = 16;

/// One manual-save announcement.
///
/// `origin` identifies the publishing session instance: unlike a browser
/// broadcast channel, a process-level bus delivers to the publisher's own
/// subscription too, so receivers filter their own notices by origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveNotice {
    pub case_id: String,
    pub saved_at: DateTime<Utc>,
    pub origin: Uuid,
}

/// Publish/subscribe hub for save notices, keyed by case identifier.
#[derive(Clone, Default)]
pub struct SaveBus {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<SaveNotice>>>>,
}

impl SaveBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce a manual save to every currently subscribed session of the
    /// case. Failures are ignored: absence of cross-session notification is
    /// never fatal.
    pub fn publish(&self, case_id: &str, saved_at: DateTime<Utc>, origin: Uuid) {
        let Ok(mut channels) = self.channels.lock() else {
            tracing::warn!("save bus lock poisoned; dropping notice for {case_id}");
            return;
        };
        if let Some(sender) = channels.get(case_id) {
            let notice = SaveNotice {
                case_id: case_id.to_string(),
                saved_at,
                origin,
            };
            if sender.send(notice).is_err() {
                // Every receiver is gone; drop the idle channel.
                channels.remove(case_id);
            }
        }
    }

    /// Subscribe to save notices for a case. Dropping the receiver
    /// unsubscribes; only notices published while subscribed are delivered.
    pub fn subscribe(&self, case_id: &str) -> broadcast::Receiver<SaveNotice> {
        let Ok(mut channels) = self.channels.lock() else {
            tracing::warn!("save bus lock poisoned; returning detached receiver for {case_id}");
            return broadcast::channel(CHANNEL_CAPACITY).1;
        };
        channels
            .entry(case_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}
