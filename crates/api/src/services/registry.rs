//! Live dispatch runs, keyed by emergency id.
//!
//! Each run owns a cancellation token and at most one pending offer. A
//! technician's answer is handed to the waiting run through a oneshot channel,
//! so the run wakes immediately instead of polling the store.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A technician's answer to an outstanding offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferResponse {
    /// The request was bound to this technician (already persisted).
    Accepted(Uuid),
    Declined,
}

struct PendingOffer {
    technician_id: Uuid,
    responder: oneshot::Sender<OfferResponse>,
}

struct ActiveRun {
    token: CancellationToken,
    pending: Option<PendingOffer>,
}

#[derive(Clone)]
pub struct DispatchRegistry {
    runs: Arc<Mutex<HashMap<Uuid, ActiveRun>>>,
    shutdown: CancellationToken,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers a run. Returns `None` if one is already live for the request.
    pub async fn register(&self, request_id: Uuid) -> Option<CancellationToken> {
        let mut runs = self.runs.lock().await;
        if runs.contains_key(&request_id) {
            return None;
        }
        let token = self.shutdown.child_token();
        runs.insert(
            request_id,
            ActiveRun {
                token: token.clone(),
                pending: None,
            },
        );
        Some(token)
    }

    /// Opens the single pending offer slot for a run, replacing any stale one.
    pub async fn open_offer(
        &self,
        request_id: Uuid,
        technician_id: Uuid,
    ) -> Option<oneshot::Receiver<OfferResponse>> {
        let mut runs = self.runs.lock().await;
        let run = runs.get_mut(&request_id)?;
        let (responder, receiver) = oneshot::channel();
        run.pending = Some(PendingOffer {
            technician_id,
            responder,
        });
        Some(receiver)
    }

    /// Wakes the run waiting on an offer.
    ///
    /// A decline only counts from the technician holding the offer. An
    /// acceptance always wakes the run, because the request is already bound.
    pub async fn respond(
        &self,
        request_id: Uuid,
        technician_id: Uuid,
        response: OfferResponse,
    ) -> bool {
        let mut runs = self.runs.lock().await;
        let Some(run) = runs.get_mut(&request_id) else {
            return false;
        };
        let matches = match (&run.pending, response) {
            (Some(_), OfferResponse::Accepted(_)) => true,
            (Some(pending), OfferResponse::Declined) => pending.technician_id == technician_id,
            (None, _) => false,
        };
        if !matches {
            return false;
        }
        run.pending
            .take()
            .is_some_and(|pending| pending.responder.send(response).is_ok())
    }

    /// Drops the pending offer if it still belongs to the technician.
    pub async fn close_offer(&self, request_id: Uuid, technician_id: Uuid) {
        let mut runs = self.runs.lock().await;
        if let Some(run) = runs.get_mut(&request_id) {
            if run
                .pending
                .as_ref()
                .is_some_and(|p| p.technician_id == technician_id)
            {
                run.pending = None;
            }
        }
    }

    /// Signals the run to stop. Returns false if no run was live.
    pub async fn cancel(&self, request_id: Uuid) -> bool {
        let runs = self.runs.lock().await;
        match runs.get(&request_id) {
            Some(run) => {
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn finish(&self, request_id: Uuid) {
        self.runs.lock().await.remove(&request_id);
    }

    pub async fn is_active(&self, request_id: Uuid) -> bool {
        self.runs.lock().await.contains_key(&request_id)
    }

    pub async fn active_count(&self) -> usize {
        self.runs.lock().await.len()
    }

    /// Cancels every live run.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
