//! In-memory intent status store
//!
//! `StatusStore` owns one [`IntentStatus`] per registered intent and publishes
//! every registration and state change to its subscribers. States only move
//! forward: `Pending` → `Submitted` → `Confirmed` | `Failed`, with `Pending`
//! allowed to jump straight to a terminal state.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Error;
use crate::intent::{Intent, IntentId};

/// Lifecycle state of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl IntentState {
    fn rank(self) -> u8 {
        match self {
            IntentState::Pending => 0,
            IntentState::Submitted => 1,
            IntentState::Confirmed | IntentState::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, IntentState::Confirmed | IntentState::Failed)
    }

    /// Whether moving from `self` to `next` is a forward transition
    pub fn can_transition_to(self, next: IntentState) -> bool {
        next.rank() > self.rank()
    }
}

impl fmt::Display for IntentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentState::Pending => write!(f, "Pending"),
            IntentState::Submitted => write!(f, "Submitted"),
            IntentState::Confirmed => write!(f, "Confirmed"),
            IntentState::Failed => write!(f, "Failed"),
        }
    }
}

/// Current status of one intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentStatus {
    pub intent_id: IntentId,
    pub state: IntentState,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Extra data attached to a state change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDetail {
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

impl StatusDetail {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tx_hash(hash: impl Into<String>) -> Self {
        Self {
            tx_hash: Some(hash.into()),
            error: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            tx_hash: None,
            error: Some(reason.into()),
        }
    }
}

/// Handle returned by [`StatusStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&IntentStatus) + Send + Sync>;

struct Inner {
    records: RwLock<HashMap<IntentId, IntentStatus>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

/// Subscribable record of every intent's status
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<Inner>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                records: RwLock::new(HashMap::new()),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Insert a new `Pending` status for `intent`
    pub fn register(&self, intent: &Intent) -> Result<IntentStatus, Error> {
        let status = IntentStatus {
            intent_id: intent.id(),
            state: IntentState::Pending,
            tx_hash: None,
            error: None,
            updated_at: Utc::now(),
        };

        {
            let mut records = self
                .inner
                .records
                .write()
                .unwrap_or_else(|e| e.into_inner());
            if records.contains_key(&intent.id()) {
                return Err(Error::DuplicateIntent(intent.id()));
            }
            records.insert(intent.id(), status.clone());
        }

        debug!(intent_id = %intent.id(), kind = %intent.kind(), "Registered intent");
        self.publish(&status);
        Ok(status)
    }

    /// Move an intent to `new_state`, rejecting backward or repeated transitions
    pub fn update(
        &self,
        intent_id: IntentId,
        new_state: IntentState,
        detail: StatusDetail,
    ) -> Result<IntentStatus, Error> {
        let status = {
            let mut records = self
                .inner
                .records
                .write()
                .unwrap_or_else(|e| e.into_inner());
            let record = records
                .get_mut(&intent_id)
                .ok_or(Error::UnknownIntent(intent_id))?;

            if !record.state.can_transition_to(new_state) {
                return Err(Error::InvalidTransition {
                    intent_id,
                    from: record.state,
                    to: new_state,
                });
            }

            record.state = new_state;
            if detail.tx_hash.is_some() {
                record.tx_hash = detail.tx_hash;
            }
            if detail.error.is_some() {
                record.error = detail.error;
            }
            record.updated_at = Utc::now();
            record.clone()
        };

        debug!(%intent_id, state = %status.state, "Intent status updated");
        self.publish(&status);
        Ok(status)
    }

    pub fn get(&self, intent_id: &IntentId) -> Option<IntentStatus> {
        self.inner
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(intent_id)
            .cloned()
    }

    /// All known statuses, oldest update first
    pub fn snapshot(&self) -> Vec<IntentStatus> {
        let mut statuses: Vec<_> = self
            .inner
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        statuses.sort_by_key(|s| s.updated_at);
        statuses
    }

    /// Statuses that have not reached a terminal state
    pub fn in_flight(&self) -> Vec<IntentStatus> {
        self.snapshot()
            .into_iter()
            .filter(|s| !s.state.is_terminal())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver every subsequent registration and update to `callback`
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&IntentStatus) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        trace!(subscription = id.0, "Added status subscriber");
        id
    }

    /// Stop delivery to a subscriber; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        unsubscribe_inner(&self.inner, id)
    }

    /// Channel-backed subscription for async consumers
    ///
    /// The subscription is removed when the receiver is dropped.
    pub fn watch(&self) -> StatusReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |status| {
            let _ = tx.send(status.clone());
        });
        StatusReceiver {
            rx,
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    fn publish(&self, status: &IntentStatus) {
        // Callbacks run outside the lock so they may call back into the store
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, s)| s.clone())
            .collect();

        for subscriber in subscribers {
            subscriber(status);
        }
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStore")
            .field("intents", &self.len())
            .finish()
    }
}

fn unsubscribe_inner(inner: &Inner, id: SubscriptionId) -> bool {
    let mut subscribers = inner.subscribers.lock().unwrap_or_else(|e| e.into_inner());
    let before = subscribers.len();
    subscribers.retain(|(sid, _)| *sid != id);
    before != subscribers.len()
}

/// Receiving half of [`StatusStore::watch`]
pub struct StatusReceiver {
    rx: mpsc::UnboundedReceiver<IntentStatus>,
    id: SubscriptionId,
    store: Weak<Inner>,
}

impl StatusReceiver {
    /// Next status change, or `None` once the store is gone
    pub async fn recv(&mut self) -> Option<IntentStatus> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<IntentStatus> {
        self.rx.try_recv().ok()
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for StatusReceiver {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            unsubscribe_inner(&inner, self.id);
        }
    }
}
