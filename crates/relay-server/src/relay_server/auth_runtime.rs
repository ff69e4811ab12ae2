//! Shared-secret authentication for the v2 surface.

use super::*;

/// Exact-match check of the `X-Relay-Key` header against the configured
/// shared secret. Failures are counted and carry no detail.
pub(super) fn authorize_relay_request(
    state: &RelayServerState,
    headers: &HeaderMap,
) -> Result<(), RelayApiError> {
    let observed = headers
        .get(RELAY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    match observed {
        Some(observed) if observed == state.config.relay_key => Ok(()),
        _ => {
            RelayServerState::bump(&state.counters.auth_failures);
            Err(RelayApiError::unauthorized())
        }
    }
}
