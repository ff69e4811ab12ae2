//! Three-tier rolling-comment upsert: mapping, marker scan, create.

use super::*;

/// Next step of the upsert. An update failure transitions instead of
/// terminating; only listing and creating propagate errors.
enum UpsertStep {
    HasMapping(u64),
    NeedsScan,
    NeedsCreate,
}

/// Guarantees exactly one marker-tagged status comment converges per issue:
/// try the mapped comment id, fall back to a marker scan, create as a last
/// resort. Returns the comment id that now carries the body.
pub(super) async fn upsert_rolling_comment(
    state: &RelayServerState,
    session: &ForgeSession,
    repo_ref: &RepoRef,
    issue_number: u64,
    body: &str,
) -> Result<u64, RelayApiError> {
    let repo = repo_ref.to_string();
    let mut step = match state
        .store
        .rolling_comment(&repo, issue_number)
        .map_err(|error| RelayApiError::store(&error))?
    {
        Some(row) => UpsertStep::HasMapping(row.comment_id),
        None => UpsertStep::NeedsScan,
    };

    loop {
        match step {
            UpsertStep::HasMapping(comment_id) => {
                match session.update_comment(repo_ref, comment_id, body).await {
                    Ok(()) => {
                        remember_comment(state, &repo, issue_number, comment_id)?;
                        RelayServerState::bump(&state.counters.comments_updated);
                        return Ok(comment_id);
                    }
                    // Deleted or inaccessible comment: the mapping is stale.
                    Err(_) => step = UpsertStep::NeedsScan,
                }
            }
            UpsertStep::NeedsScan => {
                match scan_for_marker_comment(session, repo_ref, issue_number).await? {
                    Some(comment_id) => {
                        match session.update_comment(repo_ref, comment_id, body).await {
                            Ok(()) => {
                                remember_comment(state, &repo, issue_number, comment_id)?;
                                RelayServerState::bump(&state.counters.comments_updated);
                                return Ok(comment_id);
                            }
                            Err(_) => step = UpsertStep::NeedsCreate,
                        }
                    }
                    None => step = UpsertStep::NeedsCreate,
                }
            }
            UpsertStep::NeedsCreate => {
                let created = session
                    .create_comment(repo_ref, issue_number, body)
                    .await
                    .map_err(|error| RelayApiError::forge(&error))?;
                remember_comment(state, &repo, issue_number, created.id)?;
                RelayServerState::bump(&state.counters.comments_created);
                return Ok(created.id);
            }
        }
    }
}

/// Pages through comments looking for the marker. Stops after
/// [`COMMENT_SCAN_MAX_PAGES`] pages; a marker comment beyond that is treated
/// as absent and a later scan converges on whichever copy is found first.
async fn scan_for_marker_comment(
    session: &ForgeSession,
    repo_ref: &RepoRef,
    issue_number: u64,
) -> Result<Option<u64>, RelayApiError> {
    for page in 1..=COMMENT_SCAN_MAX_PAGES {
        let comments = session
            .list_comments(repo_ref, issue_number, page)
            .await
            .map_err(|error| RelayApiError::forge(&error))?;
        let page_len = comments.len();
        let marker_hit = comments.into_iter().find(|comment| {
            comment
                .body
                .as_deref()
                .is_some_and(|body| body.contains(ROLLING_STATUS_MARKER))
        });
        if let Some(comment) = marker_hit {
            return Ok(Some(comment.id));
        }
        if (page_len as u64) < relay_forge::COMMENTS_PAGE_SIZE {
            break;
        }
    }
    Ok(None)
}

fn remember_comment(
    state: &RelayServerState,
    repo: &str,
    issue_number: u64,
    comment_id: u64,
) -> Result<(), RelayApiError> {
    state
        .store
        .upsert_rolling_comment(repo, issue_number, comment_id, &utc_now_rfc3339())
        .map_err(|error| RelayApiError::store(&error))
}
