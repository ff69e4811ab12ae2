//! Relay HTTP server and the v2 event ingestion pipeline.
//!
//! Request flow for `POST /v2/events`: auth, parse, validate, canonical
//! hash, idempotency lookup, provenance check against the PR head, verdict
//! downgrade, event insert (the commit point), status-comment render and
//! upsert, label transitions, response. Every forge call happens through a
//! request-scoped session holding one lazily minted installation token.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use relay_core::{current_unix_timestamp_ms, utc_now_rfc3339, write_text_atomic};
use relay_events::{
    canonical_payload_json, compare_reported_commit, effective_verdict, payload_hash,
    render_status_comment, validate_event, ActivityLine, EventSubmission, LabelRuleSet,
    NormalizedEvent, Provenance, QaResultView, StatusCommentContext, Verdict,
    ROLLING_STATUS_MARKER,
};
use relay_forge::{ForgeClient, ForgeClientConfig, ForgeError, ForgeIssue, ForgeSession, RepoRef};
use relay_store::{
    EventInsertOutcome, EventRecord, EvidenceRecord, RelayStoreError, SqliteRelayStore,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

mod auth_runtime;
mod comment_upsert_runtime;
mod endpoints;
mod event_ingest_runtime;
mod evidence_object_store;
mod evidence_runtime;
mod label_runtime;
mod pipeline_log;
mod server_bootstrap;
mod server_state;
mod status_runtime;
mod types;

use auth_runtime::authorize_relay_request;
use comment_upsert_runtime::upsert_rolling_comment;
use endpoints::*;
use event_ingest_runtime::handle_event_ingest;
use evidence_object_store::{sanitize_filename, EvidenceObjectStore, PendingUpload};
use evidence_runtime::{handle_evidence_download, handle_evidence_upload};
use label_runtime::apply_label_transitions;
use pipeline_log::{pipeline_log_line, PipelineEventLog};
#[cfg(test)]
use server_bootstrap::build_relay_router;
pub use server_bootstrap::run_relay_server;
pub use server_state::RelayServerConfig;
use server_state::RelayServerState;
use status_runtime::handle_relay_status;
use types::{pretty_json_response, RelayApiError};
