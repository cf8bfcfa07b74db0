//! Transfer decision heuristic

use crate::core::state::SyncState;

/// Decides whether a tracked pair needs a transfer. Pure, no I/O.
///
/// A transfer is needed when the current content no longer matches the
/// recorded fingerprint (or nothing was recorded yet), or when the remote
/// side was recorded as synced after the local side. Both sides changing
/// between runs is not detectable here; the executing role's transfer
/// direction picks the winner.
pub fn needs_sync(
    state: &SyncState,
    local_key: &str,
    remote_key: &str,
    current_fingerprint: &str,
) -> bool {
    let Some(local_rec) = state.get(local_key) else {
        return true;
    };

    if local_rec.local_hash.as_deref() != Some(current_fingerprint) {
        return true;
    }

    if let Some(remote_rec) = state.get(remote_key) {
        if remote_rec.timestamp > local_rec.timestamp {
            return true;
        }
    }

    false
}
