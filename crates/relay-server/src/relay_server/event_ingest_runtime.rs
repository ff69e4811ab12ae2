//! `POST /v2/events`: the core ingestion pipeline.

use super::*;

enum PipelineOutcome {
    Stored {
        event_id: String,
        rolling_comment_id: u64,
        verdict: Option<Verdict>,
        provenance_verified: Option<bool>,
    },
    Idempotent {
        event_id: String,
    },
    Conflict {
        event_id: String,
        existing_hash: String,
        new_hash: String,
    },
}

pub(super) async fn handle_event_ingest(
    State(state): State<Arc<RelayServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(error) = authorize_relay_request(&state, &headers) {
        return error.into_response();
    }

    let submission: EventSubmission = match serde_json::from_slice(&body) {
        Ok(submission) => submission,
        Err(error) => {
            return RelayApiError::bad_request(format!("invalid json payload: {error}"))
                .into_response();
        }
    };
    let repo_hint = submission.repo.clone().unwrap_or_default();
    let event_id_hint = submission.event_id.clone();
    let event = match validate_event(submission) {
        Ok(event) => event,
        Err(error) => {
            RelayServerState::bump(&state.counters.validation_rejects);
            state.record_pipeline_event(
                "event_validation_rejected",
                &repo_hint,
                0,
                event_id_hint.as_deref(),
                json!({ "rule": error.to_string() }),
            );
            return RelayApiError::bad_request(error.to_string()).into_response();
        }
    };

    match execute_event_pipeline(&state, event).await {
        Ok(PipelineOutcome::Stored {
            event_id,
            rolling_comment_id,
            verdict,
            provenance_verified,
        }) => pretty_json_response(
            StatusCode::CREATED,
            &json!({
                "ok": true,
                "event_id": event_id,
                "stored": true,
                "rolling_comment_id": rolling_comment_id,
                "verdict": verdict.map(|verdict| verdict.as_str()),
                "provenance_verified": provenance_verified,
            }),
        ),
        Ok(PipelineOutcome::Idempotent { event_id }) => pretty_json_response(
            StatusCode::OK,
            &json!({
                "ok": true,
                "idempotent": true,
                "event_id": event_id,
            }),
        ),
        Ok(PipelineOutcome::Conflict {
            event_id,
            existing_hash,
            new_hash,
        }) => pretty_json_response(
            StatusCode::CONFLICT,
            &json!({
                "error": format!("event_id '{event_id}' was already stored with a different payload"),
                "existing_hash": existing_hash,
                "new_hash": new_hash,
            }),
        ),
        Err(error) => error.into_response(),
    }
}

/// Runs the pipeline for a validated event. The event insert is the commit
/// point: failures before it leave no trace, failures after it surface as
/// errors while the stored row stays authoritative and the next upsert
/// converges the derived state.
async fn execute_event_pipeline(
    state: &RelayServerState,
    event: NormalizedEvent,
) -> Result<PipelineOutcome, RelayApiError> {
    let canonical = canonical_payload_json(&event)
        .map_err(|error| RelayApiError::internal("failed to canonicalize payload")
            .with_details(error.to_string()))?;
    let hash = payload_hash(&canonical);

    if let Some(existing) = state
        .store
        .get_event(&event.event_id)
        .map_err(|error| RelayApiError::store(&error))?
    {
        return Ok(resolve_duplicate(state, &event, existing.payload_hash, hash));
    }

    let repo_ref = RepoRef::parse(&event.repo)
        .ok_or_else(|| RelayApiError::bad_request("repo must match <owner>/<name>"))?;
    let session = state.forge.session();

    let provenance = match reported_build(&event) {
        Some((pr, reported_sha)) => {
            let head_sha = session
                .pr_head_sha(&repo_ref, pr)
                .await
                .map_err(|error| pipeline_forge_error(state, &event, "provenance_check", &error))?;
            compare_reported_commit(reported_sha, &head_sha)
        }
        None => Provenance::NotApplicable,
    };
    let verdict = effective_verdict(event.overall_verdict, &provenance);

    let record = EventRecord {
        event_id: event.event_id.clone(),
        repo: event.repo.clone(),
        issue_number: event.issue_number,
        event_type: event.event_type.clone(),
        role: event.role.as_str().to_string(),
        agent: event.agent.clone(),
        environment: event.environment.map(|environment| environment.as_str().to_string()),
        overall_verdict: verdict.map(|verdict| verdict.as_str().to_string()),
        created_at: utc_now_rfc3339(),
        payload_hash: hash.clone(),
        payload_json: canonical,
    };
    match state
        .store
        .insert_event(&record)
        .map_err(|error| RelayApiError::store(&error))?
    {
        EventInsertOutcome::Inserted => {}
        EventInsertOutcome::Idempotent => {
            return Ok(resolve_duplicate(state, &event, hash.clone(), hash));
        }
        EventInsertOutcome::Conflict { existing_hash } => {
            return Ok(resolve_duplicate(state, &event, existing_hash, hash));
        }
    }
    RelayServerState::bump(&state.counters.events_stored);

    let issue = session
        .get_issue(&repo_ref, event.issue_number)
        .await
        .map_err(|error| pipeline_forge_error(state, &event, "issue_fetch", &error))?;
    let context = build_status_context(state, &event, &issue, &provenance)?;
    let comment_body = render_status_comment(&context);
    let rolling_comment_id = upsert_rolling_comment(
        state,
        &session,
        &repo_ref,
        event.issue_number,
        &comment_body,
    )
    .await
    .map_err(|error| {
        state.record_pipeline_event(
            "event_pipeline_failed",
            &event.repo,
            event.issue_number,
            Some(&event.event_id),
            json!({ "stage": "comment_upsert" }),
        );
        error
    })?;
    apply_label_transitions(
        state,
        &session,
        &repo_ref,
        event.issue_number,
        &issue.label_names(),
        &event.event_type,
        verdict,
    )
    .await
    .map_err(|error| pipeline_forge_error(state, &event, "label_transition", &error))?;

    state.record_pipeline_event(
        "event_stored",
        &event.repo,
        event.issue_number,
        Some(&event.event_id),
        json!({
            "event_type": event.event_type,
            "verdict": verdict.map(|verdict| verdict.as_str()),
            "provenance_verified": provenance.verified_flag(),
            "rolling_comment_id": rolling_comment_id,
        }),
    );
    Ok(PipelineOutcome::Stored {
        event_id: event.event_id,
        rolling_comment_id,
        verdict,
        provenance_verified: provenance.verified_flag(),
    })
}

fn resolve_duplicate(
    state: &RelayServerState,
    event: &NormalizedEvent,
    existing_hash: String,
    new_hash: String,
) -> PipelineOutcome {
    if existing_hash == new_hash {
        RelayServerState::bump(&state.counters.idempotent_replays);
        state.record_pipeline_event(
            "event_replayed_idempotent",
            &event.repo,
            event.issue_number,
            Some(&event.event_id),
            json!({}),
        );
        PipelineOutcome::Idempotent {
            event_id: event.event_id.clone(),
        }
    } else {
        RelayServerState::bump(&state.counters.payload_conflicts);
        state.record_pipeline_event(
            "event_payload_conflict",
            &event.repo,
            event.issue_number,
            Some(&event.event_id),
            json!({ "existing_hash": existing_hash, "new_hash": new_hash }),
        );
        PipelineOutcome::Conflict {
            event_id: event.event_id.clone(),
            existing_hash,
            new_hash,
        }
    }
}

fn reported_build(event: &NormalizedEvent) -> Option<(u64, &str)> {
    let build = event.build.as_ref()?;
    let pr = build.pr?;
    Some((pr, build.commit_sha.as_str()))
}

fn pipeline_forge_error(
    state: &RelayServerState,
    event: &NormalizedEvent,
    stage: &str,
    error: &ForgeError,
) -> RelayApiError {
    state.record_pipeline_event(
        "event_pipeline_failed",
        &event.repo,
        event.issue_number,
        Some(&event.event_id),
        json!({ "stage": stage, "detail": error.to_string() }),
    );
    RelayApiError::forge(error)
}

/// Renderer inputs come from the authoritative event log at update time: the
/// newest `dev.` and `qa.` family events (including the one just written)
/// plus the recent-activity tail.
fn build_status_context(
    state: &RelayServerState,
    event: &NormalizedEvent,
    issue: &ForgeIssue,
    provenance: &Provenance,
) -> Result<StatusCommentContext, RelayApiError> {
    let latest_dev = state
        .store
        .latest_event_by_type_prefix(&event.repo, event.issue_number, DEV_EVENT_TYPE_PREFIX)
        .map_err(|error| RelayApiError::store(&error))?;
    let latest_qa = state
        .store
        .latest_event_by_type_prefix(&event.repo, event.issue_number, QA_EVENT_TYPE_PREFIX)
        .map_err(|error| RelayApiError::store(&error))?;
    let recent = state
        .store
        .recent_events(&event.repo, event.issue_number, RECENT_ACTIVITY_LIMIT)
        .map_err(|error| RelayApiError::store(&error))?;

    let latest_dev_summary = latest_dev
        .as_ref()
        .and_then(decode_stored_payload)
        .and_then(|payload| payload.summary);
    let latest_qa = latest_qa.as_ref().map(|row| {
        let payload = decode_stored_payload(row);
        QaResultView {
            verdict: row.overall_verdict.clone(),
            scope_results: payload
                .as_ref()
                .and_then(|payload| payload.scope_results.clone())
                .unwrap_or_default(),
            evidence_urls: payload
                .and_then(|payload| payload.evidence_urls)
                .unwrap_or_default(),
        }
    });

    Ok(StatusCommentContext {
        issue_number: event.issue_number,
        labels: issue.label_names(),
        assignee: issue.first_assignee().map(str::to_string),
        environment: event
            .environment
            .map(|environment| environment.as_str().to_string()),
        build_pr: event.build.as_ref().and_then(|build| build.pr),
        build_commit_sha: event.build.as_ref().map(|build| build.commit_sha.clone()),
        provenance: provenance.clone(),
        latest_dev_summary,
        latest_qa,
        recent_activity: recent
            .iter()
            .map(|row| ActivityLine {
                occurred_at: row.created_at.clone(),
                event_type: row.event_type.clone(),
                agent: row.agent.clone(),
            })
            .collect(),
    })
}

fn decode_stored_payload(row: &EventRecord) -> Option<NormalizedEvent> {
    serde_json::from_str(&row.payload_json).ok()
}
