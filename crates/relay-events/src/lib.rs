//! Domain model for relay lifecycle events.
//!
//! Everything in this crate is pure: payload validation and normalization,
//! canonical serialization and hashing, the provenance downgrade rule, the
//! declarative label transition rules, and the rolling status-comment
//! renderer. I/O lives in the forge, store, and server crates.

pub mod event_hashing;
pub mod event_payload;
pub mod event_validation;
pub mod label_rules;
pub mod provenance;
pub mod status_comment;

pub use event_hashing::{canonical_payload_json, payload_hash};
pub use event_payload::{
    AgentRole, BuildRef, EventSubmission, NormalizedEvent, RunEnvironment, ScopeResult,
    ScopeStatus, Severity, Verdict,
};
pub use event_validation::{validate_event, ValidationError};
pub use label_rules::{compute_next_labels, LabelAction, LabelRuleSet, WILDCARD_VERDICT_KEY};
pub use provenance::{compare_reported_commit, effective_verdict, short_sha, Provenance};
pub use status_comment::{
    render_status_comment, ActivityLine, QaResultView, StatusCommentContext,
    ROLLING_STATUS_MARKER,
};
