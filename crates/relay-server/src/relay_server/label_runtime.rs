//! Declarative label transitions applied after a stored event.

use super::*;

use relay_events::compute_next_labels;

/// Looks up the `(event_type, effective verdict)` rule and, when one
/// matches, replaces the full label set with `(current ∪ add) \ remove` in a
/// single forge call. No rule means no forge call.
pub(super) async fn apply_label_transitions(
    state: &RelayServerState,
    session: &ForgeSession,
    repo_ref: &RepoRef,
    issue_number: u64,
    current_labels: &[String],
    event_type: &str,
    verdict: Option<Verdict>,
) -> Result<Option<Vec<String>>, ForgeError> {
    let Some(action) = state.config.label_rules.action_for(event_type, verdict) else {
        return Ok(None);
    };
    let next = compute_next_labels(current_labels, action);
    session.put_labels(repo_ref, issue_number, &next).await?;
    Ok(Some(next))
}
