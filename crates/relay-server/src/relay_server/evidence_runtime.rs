//! `POST /v2/evidence` and `GET /v2/evidence/{id}`.

use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::*;

struct StagedFile {
    upload: PendingUpload,
    filename: String,
    content_type: String,
}

pub(super) async fn handle_evidence_upload(
    State(state): State<Arc<RelayServerState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(error) = authorize_relay_request(&state, &headers) {
        return error.into_response();
    }

    let id = Uuid::new_v4().to_string();
    let mut repo_field: Option<String> = None;
    let mut issue_field: Option<String> = None;
    let mut event_id_field: Option<String> = None;
    let mut staged: Option<StagedFile> = None;

    let abort_staged = |staged: Option<StagedFile>, state: Arc<RelayServerState>| async move {
        if let Some(staged) = staged {
            state.objects.abort_upload(staged.upload).await;
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                abort_staged(staged, Arc::clone(&state)).await;
                return RelayApiError::bad_request(format!("malformed multipart body: {error}"))
                    .into_response();
            }
        };
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "repo" | "issue_number" | "event_id" => {
                let text = match field.text().await {
                    Ok(text) => text,
                    Err(error) => {
                        abort_staged(staged, Arc::clone(&state)).await;
                        return RelayApiError::bad_request(format!(
                            "failed to read multipart field '{field_name}': {error}"
                        ))
                        .into_response();
                    }
                };
                match field_name.as_str() {
                    "repo" => repo_field = Some(text),
                    "issue_number" => issue_field = Some(text),
                    _ => event_id_field = Some(text),
                }
            }
            "file" => {
                let filename = sanitize_filename(field.file_name().unwrap_or_default());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                match stage_file_field(&state, &id, field).await {
                    Ok(upload) => {
                        staged = Some(StagedFile {
                            upload,
                            filename,
                            content_type,
                        });
                    }
                    Err(error) => {
                        abort_staged(staged, Arc::clone(&state)).await;
                        return error.into_response();
                    }
                }
            }
            // Unknown multipart fields are ignored.
            _ => {}
        }
    }

    let parsed = validate_upload_fields(repo_field, issue_field, staged.is_some());
    let (repo_ref, issue_number) = match parsed {
        Ok(parsed) => parsed,
        Err(error) => {
            abort_staged(staged, Arc::clone(&state)).await;
            return error.into_response();
        }
    };
    let staged = match staged {
        Some(staged) => staged,
        None => {
            return RelayApiError::bad_request("multipart field 'file' is required")
                .into_response();
        }
    };

    let object_key =
        EvidenceObjectStore::object_key(&repo_ref, issue_number, &id, &staged.filename);
    let created_at = utc_now_rfc3339();
    let metadata = json!({
        "repo": repo_ref.to_string(),
        "issue_number": issue_number,
        "event_id": event_id_field,
        "uploaded_at": created_at,
    });
    let size_bytes = match state
        .objects
        .commit_upload(staged.upload, &object_key, &metadata)
        .await
    {
        Ok(size_bytes) => size_bytes,
        Err(error) => {
            return RelayApiError::internal("failed to persist evidence object")
                .with_details(error.to_string())
                .into_response();
        }
    };

    let record = EvidenceRecord {
        id: id.clone(),
        repo: repo_ref.to_string(),
        issue_number,
        event_id: event_id_field,
        filename: staged.filename,
        content_type: staged.content_type,
        size_bytes,
        object_key,
        created_at,
    };
    if let Err(error) = state.store.insert_evidence(&record) {
        return RelayApiError::store(&error).into_response();
    }
    RelayServerState::bump(&state.counters.evidence_uploads);
    state.record_pipeline_event(
        "evidence_uploaded",
        &record.repo,
        record.issue_number,
        record.event_id.as_deref(),
        json!({ "evidence_id": record.id, "size_bytes": record.size_bytes }),
    );

    pretty_json_response(
        StatusCode::CREATED,
        &json!({
            "id": record.id,
            "repo": record.repo,
            "issue_number": record.issue_number,
            "event_id": record.event_id,
            "filename": record.filename,
            "content_type": record.content_type,
            "size_bytes": record.size_bytes,
            "url": format!("{EVIDENCE_ENDPOINT}/{}", record.id),
        }),
    )
}

pub(super) async fn handle_evidence_download(
    State(state): State<Arc<RelayServerState>>,
    headers: HeaderMap,
    AxumPath(evidence_id): AxumPath<String>,
) -> Response {
    if let Err(error) = authorize_relay_request(&state, &headers) {
        return error.into_response();
    }

    let record = match state.store.get_evidence(&evidence_id) {
        Ok(Some(record)) => record,
        Ok(None) => return RelayApiError::not_found("evidence not found").into_response(),
        Err(error) => return RelayApiError::store(&error).into_response(),
    };
    let Some(file) = state.objects.open_object(&record.object_key).await else {
        return RelayApiError::not_found("evidence object missing").into_response();
    };

    let disposition_name = record.filename.replace('"', "");
    let body = axum::body::Body::from_stream(ReaderStream::new(file));
    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.content_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{disposition_name}\""),
        )
        .header(header::CONTENT_LENGTH, record.size_bytes)
        .body(body)
    {
        Ok(response) => response,
        Err(error) => RelayApiError::internal("failed to build evidence response")
            .with_details(error.to_string())
            .into_response(),
    }
}

/// Streams one multipart `file` field into staging, enforcing the configured
/// size cap chunk-by-chunk.
async fn stage_file_field(
    state: &RelayServerState,
    id: &str,
    mut field: axum::extract::multipart::Field<'_>,
) -> Result<PendingUpload, RelayApiError> {
    let mut upload = state.objects.begin_upload(id).await.map_err(|error| {
        RelayApiError::internal("failed to stage evidence upload").with_details(error.to_string())
    })?;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(error) => {
                state.objects.abort_upload(upload).await;
                return Err(RelayApiError::bad_request(format!(
                    "failed to read multipart file: {error}"
                )));
            }
        };
        if upload.written.saturating_add(chunk.len() as u64) > state.config.max_evidence_bytes {
            state.objects.abort_upload(upload).await;
            return Err(RelayApiError::payload_too_large(format!(
                "evidence file exceeds the {} byte limit",
                state.config.max_evidence_bytes
            )));
        }
        if let Err(error) = upload.write_chunk(&chunk).await {
            state.objects.abort_upload(upload).await;
            return Err(RelayApiError::internal("failed to write evidence bytes")
                .with_details(error.to_string()));
        }
    }
    Ok(upload)
}

fn validate_upload_fields(
    repo_field: Option<String>,
    issue_field: Option<String>,
    has_file: bool,
) -> Result<(RepoRef, u64), RelayApiError> {
    let repo_raw = repo_field
        .ok_or_else(|| RelayApiError::bad_request("multipart field 'repo' is required"))?;
    let repo_ref = RepoRef::parse(&repo_raw)
        .ok_or_else(|| RelayApiError::bad_request("repo must match <owner>/<name>"))?;
    if [repo_ref.owner.as_str(), repo_ref.name.as_str()]
        .iter()
        .any(|part| matches!(*part, "." | ".."))
    {
        return Err(RelayApiError::bad_request(
            "repo components must not be relative path segments",
        ));
    }
    let issue_raw = issue_field
        .ok_or_else(|| RelayApiError::bad_request("multipart field 'issue_number' is required"))?;
    let issue_number = issue_raw
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|issue| *issue > 0)
        .ok_or_else(|| RelayApiError::bad_request("issue_number must be a positive integer"))?;
    if !has_file {
        return Err(RelayApiError::bad_request(
            "multipart field 'file' is required",
        ));
    }
    Ok((repo_ref, issue_number))
}
