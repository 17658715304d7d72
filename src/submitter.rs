//! Intent submission
//!
//! `IntentSubmitter` turns a validated payload into an [`Intent`], registers it
//! as `Pending`, and drives it to a terminal state on a background task. The
//! submission call returns the intent id immediately; progress is observed
//! through the [`StatusStore`].
//!
//! Every submission is at-most-once. A failed intent is never retried here;
//! [`IntentSubmitter::resubmit`] creates a new intent with a new id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::chain::BroadcastOutcome;
use crate::error::Error;
use crate::intent::{Intent, IntentId, IntentPayload};
use crate::session::WalletSession;
use crate::status::{IntentState, IntentStatus, StatusDetail, StatusStore};

/// Result of waiting on an intent with a caller-side timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The intent reached `Confirmed` or `Failed`
    Settled(IntentStatus),
    /// The timeout elapsed first; carries the status at that moment
    Abandoned(IntentStatus),
}

impl WaitOutcome {
    pub fn status(&self) -> &IntentStatus {
        match self {
            WaitOutcome::Settled(status) | WaitOutcome::Abandoned(status) => status,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, WaitOutcome::Settled(_))
    }
}

/// Accepts user actions and tracks them through the chain
#[derive(Clone)]
pub struct IntentSubmitter {
    session: Arc<WalletSession>,
    store: StatusStore,
    intents: Arc<RwLock<HashMap<IntentId, Intent>>>,
}

impl IntentSubmitter {
    pub fn new(session: Arc<WalletSession>, store: StatusStore) -> Self {
        Self {
            session,
            store,
            intents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    /// Register a new intent and start executing it in the background
    ///
    /// Chain and session failures never surface here; they end up as a
    /// `Failed` status. Identical payloads are not deduplicated.
    pub async fn submit(&self, payload: IntentPayload) -> Result<IntentId, Error> {
        let intent = Intent::new(payload);
        let intent_id = intent.id();

        self.store.register(&intent).map_err(|e| {
            error!(%intent_id, error = %e, "Failed to register intent");
            e
        })?;
        self.intents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(intent_id, intent.clone());

        info!(%intent_id, kind = %intent.kind(), "Intent submitted");

        let session = self.session.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = run_intent(session, store, intent).await {
                error!(%intent_id, error = %e, "Intent status invariant violated, stopped tracking");
            }
        });

        Ok(intent_id)
    }

    /// Submit a fresh intent carrying the payload of a failed one
    pub async fn resubmit(&self, intent_id: &IntentId) -> Result<IntentId, Error> {
        let status = self
            .store
            .get(intent_id)
            .ok_or(Error::UnknownIntent(*intent_id))?;
        if status.state != IntentState::Failed {
            return Err(Error::InvalidIntent(format!(
                "Intent {} is {} and cannot be resubmitted",
                intent_id, status.state
            )));
        }

        let payload = self
            .intent(intent_id)
            .ok_or(Error::UnknownIntent(*intent_id))?
            .payload()
            .clone();

        let new_id = self.submit(payload).await?;
        debug!(previous = %intent_id, %new_id, "Resubmitted failed intent");
        Ok(new_id)
    }

    pub fn intent(&self, intent_id: &IntentId) -> Option<Intent> {
        self.intents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(intent_id)
            .cloned()
    }

    pub fn status(&self, intent_id: &IntentId) -> Option<IntentStatus> {
        self.store.get(intent_id)
    }

    /// Wait until the intent settles or `timeout` elapses
    ///
    /// Timing out leaves the record alone; a result that arrives later is still
    /// applied to the store.
    pub async fn wait_for_terminal(
        &self,
        intent_id: &IntentId,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        // Subscribe before reading so no transition slips between the two
        let mut receiver = self.store.watch();

        let current = self
            .store
            .get(intent_id)
            .ok_or(Error::UnknownIntent(*intent_id))?;
        if current.state.is_terminal() {
            return Ok(WaitOutcome::Settled(current));
        }

        let wait = async {
            while let Some(status) = receiver.recv().await {
                if status.intent_id == *intent_id && status.state.is_terminal() {
                    return Some(status);
                }
            }
            None
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Some(status)) => Ok(WaitOutcome::Settled(status)),
            Ok(None) | Err(_) => {
                let last = self
                    .store
                    .get(intent_id)
                    .ok_or(Error::UnknownIntent(*intent_id))?;
                if last.state.is_terminal() {
                    return Ok(WaitOutcome::Settled(last));
                }
                debug!(%intent_id, state = %last.state, "Stopped waiting for intent");
                Ok(WaitOutcome::Abandoned(last))
            }
        }
    }
}

impl std::fmt::Debug for IntentSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentSubmitter")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Drive one intent to a terminal state
///
/// Chain and session failures become a `Failed` status. A store update that
/// breaks the transition rules ends the task and is returned.
async fn run_intent(
    session: Arc<WalletSession>,
    store: StatusStore,
    intent: Intent,
) -> Result<(), Error> {
    let intent_id = intent.id();

    if !session.is_connected() {
        return fail(&store, intent_id, &Error::NotConnected);
    }

    let call = match intent
        .payload()
        .to_contract_call(&session.config().contracts)
    {
        Ok(call) => call,
        Err(e) => return fail(&store, intent_id, &e),
    };

    let outcome = match session.broadcast(&call.contract, &call.msg, &call.funds).await {
        Ok(outcome) => outcome,
        Err(e) => return fail(&store, intent_id, &e),
    };

    let tx_hash = match outcome {
        BroadcastOutcome::Committed(confirmation) => {
            info!(%intent_id, tx_hash = %confirmation.tx_hash, height = confirmation.height, "Intent confirmed");
            return apply(
                &store,
                intent_id,
                IntentState::Confirmed,
                StatusDetail::tx_hash(confirmation.tx_hash),
            );
        }
        BroadcastOutcome::Accepted { tx_hash } => tx_hash,
    };

    apply(
        &store,
        intent_id,
        IntentState::Submitted,
        StatusDetail::tx_hash(tx_hash.clone()),
    )?;

    match session.await_confirmation(&tx_hash).await {
        Ok(confirmation) => {
            info!(%intent_id, tx_hash = %confirmation.tx_hash, height = confirmation.height, "Intent confirmed");
            apply(
                &store,
                intent_id,
                IntentState::Confirmed,
                StatusDetail::tx_hash(confirmation.tx_hash),
            )
        }
        Err(e) => fail(&store, intent_id, &e),
    }
}

fn fail(store: &StatusStore, intent_id: IntentId, err: &Error) -> Result<(), Error> {
    warn!(%intent_id, error = %err, "Intent failed");
    apply(
        store,
        intent_id,
        IntentState::Failed,
        StatusDetail::error(err.failure_reason()),
    )
}

fn apply(
    store: &StatusStore,
    intent_id: IntentId,
    state: IntentState,
    detail: StatusDetail,
) -> Result<(), Error> {
    store.update(intent_id, state, detail).map(|_| ())
}
