//! Read-modify-write of emergency requests under optimistic concurrency.

use domain::models::EmergencyRequest;
use domain::services::EmergencyStore;
use domain::{DomainError, StoreError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Reload-and-retry bound for version conflicts.
const MAX_CONFLICT_RETRIES: usize = 8;

/// Result of [`update_request`].
#[derive(Debug, Clone)]
pub struct Updated {
    /// The stored copy after the write, or the fresh copy when nothing changed.
    pub request: EmergencyRequest,
    pub saved: bool,
}

/// Loads a request, retrying a transient failure once.
pub async fn load_request(
    store: &dyn EmergencyStore,
    id: Uuid,
) -> Result<EmergencyRequest, DomainError> {
    let loaded = match store.get(id).await {
        Err(e) if e.is_transient() => {
            warn!(emergency_id = %id, error = %e, "Transient load failure, retrying once");
            store.get(id).await
        }
        other => other,
    };
    loaded?.ok_or_else(|| DomainError::emergency_not_found(id))
}

/// Applies `mutate` to the latest stored copy and writes it back with a
/// compare-and-swap.
///
/// `mutate` returns `Ok(false)` to leave the request untouched. It may run
/// several times: after a version conflict the request is reloaded and the
/// closure re-validates against the fresh state. A transient store failure is
/// retried once.
pub async fn update_request<F>(
    store: &dyn EmergencyStore,
    id: Uuid,
    mut mutate: F,
) -> Result<Updated, DomainError>
where
    F: FnMut(&mut EmergencyRequest) -> Result<bool, DomainError>,
{
    let mut transient_retried = false;
    let mut conflicts = 0;
    loop {
        let mut request = load_request(store, id).await?;
        if !mutate(&mut request)? {
            return Ok(Updated {
                request,
                saved: false,
            });
        }
        match store.save(&request).await {
            Ok(stored) => {
                return Ok(Updated {
                    request: stored,
                    saved: true,
                })
            }
            Err(StoreError::VersionConflict) if conflicts < MAX_CONFLICT_RETRIES => {
                conflicts += 1;
                debug!(emergency_id = %id, conflicts, "Version conflict, reloading");
            }
            Err(e) if e.is_transient() && !transient_retried => {
                transient_retried = true;
                warn!(emergency_id = %id, error = %e, "Transient save failure, retrying once");
            }
            Err(StoreError::NotFound) => return Err(DomainError::emergency_not_found(id)),
            Err(e) => return Err(e.into()),
        }
    }
}
