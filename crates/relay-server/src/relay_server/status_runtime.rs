//! `GET /v2/status`: operational snapshot. Performs no forge calls.

use super::*;

pub(super) async fn handle_relay_status(
    State(state): State<Arc<RelayServerState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(error) = authorize_relay_request(&state, &headers) {
        return error.into_response();
    }

    let counts = match state.store.counts() {
        Ok(counts) => counts,
        Err(error) => return RelayApiError::store(&error).into_response(),
    };
    let counters = &state.counters;
    pretty_json_response(
        StatusCode::OK,
        &json!({
            "ok": true,
            "uptime_ms": current_unix_timestamp_ms().saturating_sub(state.started_unix_ms),
            "store": {
                "events": counts.events,
                "rolling_comments": counts.rolling_comments,
                "evidence": counts.evidence,
            },
            "counters": {
                "events_stored": counters.events_stored.load(Ordering::Relaxed),
                "idempotent_replays": counters.idempotent_replays.load(Ordering::Relaxed),
                "payload_conflicts": counters.payload_conflicts.load(Ordering::Relaxed),
                "validation_rejects": counters.validation_rejects.load(Ordering::Relaxed),
                "auth_failures": counters.auth_failures.load(Ordering::Relaxed),
                "comments_created": counters.comments_created.load(Ordering::Relaxed),
                "comments_updated": counters.comments_updated.load(Ordering::Relaxed),
                "evidence_uploads": counters.evidence_uploads.load(Ordering::Relaxed),
            },
            "forge_api_base": state.config.forge_api_base,
            "label_rules_loaded": !state.config.label_rules.is_empty(),
        }),
    )
}
