use serde_json::Value;
use thiserror::Error;

use crate::event_payload::{
    AgentRole, BuildRef, BuildSubmission, EventSubmission, NormalizedEvent, RunEnvironment,
    ScopeResult, ScopeResultSubmission, ScopeStatus, Severity, Verdict,
};

/// First validation rule violated by an inbound event, as a single
/// caller-facing diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

const MIN_EVENT_ID_CHARS: usize = 8;
const MIN_AGENT_CHARS: usize = 2;
const MIN_TRIAGE_FIELD_CHARS: usize = 3;

/// Validates and normalizes an inbound submission.
///
/// Rules are applied in declaration order and the first violation wins.
/// Coercions: string-typed numbers are accepted for `issue_number` and
/// `build.pr`; `build.commit_sha` is lowercased. Unknown fields pass through
/// into the normalized payload unvalidated.
pub fn validate_event(submission: EventSubmission) -> Result<NormalizedEvent, ValidationError> {
    let event_id = required_string("event_id", submission.event_id)?;
    if event_id.chars().count() < MIN_EVENT_ID_CHARS {
        return Err(ValidationError::new(format!(
            "event_id must be at least {MIN_EVENT_ID_CHARS} characters"
        )));
    }

    let repo = required_string("repo", submission.repo)?;
    validate_repo_slug(&repo)?;

    let issue_number = match submission.issue_number {
        Some(value) => coerce_positive_int("issue_number", &value)?,
        None => return Err(ValidationError::new("issue_number is required")),
    };

    let event_type = required_string("event_type", submission.event_type)?;

    let role_raw = required_string("role", submission.role)?;
    let role = AgentRole::parse(&role_raw).ok_or_else(|| {
        ValidationError::new("role must be one of: QA, DEV, PM, MENTOR")
    })?;

    let agent = required_string("agent", submission.agent)?;
    if agent.chars().count() < MIN_AGENT_CHARS {
        return Err(ValidationError::new(format!(
            "agent must be at least {MIN_AGENT_CHARS} characters"
        )));
    }

    let environment = match submission.environment.as_deref() {
        Some(raw) => Some(RunEnvironment::parse(raw).ok_or_else(|| {
            ValidationError::new("environment must be one of: preview, production, dev")
        })?),
        None => None,
    };

    let overall_verdict = match submission.overall_verdict.as_deref() {
        Some(raw) => Some(Verdict::parse(raw).ok_or_else(|| {
            ValidationError::new(
                "overall_verdict must be one of: PASS, FAIL, BLOCKED, PASS_UNVERIFIED, FAIL_UNCONFIRMED",
            )
        })?),
        None => None,
    };

    let build = match submission.build {
        Some(build) => Some(validate_build(build)?),
        None => None,
    };

    let scope_results = match submission.scope_results {
        Some(results) => Some(validate_scope_results(results)?),
        None => None,
    };

    let severity = match submission.severity.as_deref() {
        Some(raw) => Some(Severity::parse(raw).ok_or_else(|| {
            ValidationError::new("severity must be one of: P0, P1, P2, P3")
        })?),
        None => None,
    };

    let triage_required = overall_verdict
        .map(|verdict| verdict.requires_triage_fields())
        .unwrap_or(false);
    if triage_required {
        if severity.is_none() {
            return Err(ValidationError::new(
                "severity is required when overall_verdict is FAIL or BLOCKED",
            ));
        }
        require_triage_text("repro_steps", submission.repro_steps.as_deref())?;
        require_triage_text("expected", submission.expected.as_deref())?;
        require_triage_text("actual", submission.actual.as_deref())?;
    }

    Ok(NormalizedEvent {
        event_id,
        repo,
        issue_number,
        event_type,
        role,
        agent,
        environment,
        overall_verdict,
        build,
        scope_results,
        severity,
        repro_steps: submission.repro_steps,
        expected: submission.expected,
        actual: submission.actual,
        summary: submission.summary,
        evidence_urls: submission.evidence_urls,
        artifacts: submission.artifacts,
        details: submission.details,
        extra: submission.extra,
    })
}

fn required_string(
    field: &'static str,
    value: Option<String>,
) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ValidationError::new(format!("{field} is required"))),
    }
}

fn validate_repo_slug(repo: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new("repo must match <owner>/<name>");
    let (owner, name) = repo.split_once('/').ok_or_else(invalid)?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return Err(invalid());
    }
    Ok(())
}

fn coerce_positive_int(field: &'static str, value: &Value) -> Result<u64, ValidationError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .filter(|parsed| *parsed > 0)
        .ok_or_else(|| ValidationError::new(format!("{field} must be a positive integer")))
}

fn validate_build(build: BuildSubmission) -> Result<BuildRef, ValidationError> {
    let commit_sha = build
        .commit_sha
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ValidationError::new("build.commit_sha is required"))?
        .to_ascii_lowercase();
    let hex_len = commit_sha.chars().count();
    if !(7..=40).contains(&hex_len) || !commit_sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::new(
            "build.commit_sha must be 7-40 hex characters",
        ));
    }
    let pr = match build.pr {
        Some(value) => Some(coerce_positive_int("build.pr", &value)?),
        None => None,
    };
    Ok(BuildRef {
        commit_sha,
        pr,
        extra: build.extra,
    })
}

fn validate_scope_results(
    results: Vec<ScopeResultSubmission>,
) -> Result<Vec<ScopeResult>, ValidationError> {
    if results.is_empty() {
        return Err(ValidationError::new("scope_results must not be empty"));
    }
    results
        .into_iter()
        .map(|result| {
            let id = result
                .id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| ValidationError::new("scope_results[].id must be non-empty"))?;
            let status_raw = result.status.ok_or_else(|| {
                ValidationError::new("scope_results[].status is required")
            })?;
            let status = ScopeStatus::parse(&status_raw).ok_or_else(|| {
                ValidationError::new("scope_results[].status must be one of: PASS, FAIL, SKIPPED")
            })?;
            Ok(ScopeResult {
                id,
                status,
                notes: result.notes,
            })
        })
        .collect()
}

fn require_triage_text(
    field: &'static str,
    value: Option<&str>,
) -> Result<(), ValidationError> {
    match value {
        Some(text) if text.chars().count() >= MIN_TRIAGE_FIELD_CHARS => Ok(()),
        _ => Err(ValidationError::new(format!(
            "{field} is required (min {MIN_TRIAGE_FIELD_CHARS} characters) when overall_verdict is FAIL or BLOCKED"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::validate_event;
    use crate::event_payload::{AgentRole, EventSubmission, ScopeStatus, Verdict};

    fn submission_from(value: serde_json::Value) -> EventSubmission {
        serde_json::from_value(value).expect("decode submission")
    }

    fn base_submission() -> serde_json::Value {
        json!({
            "event_id": "evt-00000001",
            "repo": "acme/web",
            "issue_number": 42,
            "event_type": "qa.result_submitted",
            "role": "QA",
            "agent": "qa-bot",
        })
    }

    #[test]
    fn unit_validate_event_accepts_minimal_payload() {
        let event = validate_event(submission_from(base_submission())).expect("valid");
        assert_eq!(event.event_id, "evt-00000001");
        assert_eq!(event.issue_number, 42);
        assert_eq!(event.role, AgentRole::QA);
        assert!(event.overall_verdict.is_none());
    }

    #[test]
    fn unit_validate_event_rejects_short_event_id_and_agent() {
        let mut payload = base_submission();
        payload["event_id"] = json!("short");
        let error = validate_event(submission_from(payload)).expect_err("short event_id");
        assert!(error.to_string().contains("event_id"));

        let mut payload = base_submission();
        payload["agent"] = json!("x");
        let error = validate_event(submission_from(payload)).expect_err("short agent");
        assert!(error.to_string().contains("agent"));
    }

    #[test]
    fn unit_validate_event_rejects_malformed_repo_slug() {
        for bad in ["acme", "acme/", "/web", "acme/web/extra"] {
            let mut payload = base_submission();
            payload["repo"] = json!(bad);
            let error = validate_event(submission_from(payload)).expect_err(bad);
            assert!(error.to_string().contains("repo"));
        }
    }

    #[test]
    fn functional_validate_event_coerces_string_numbers_and_lowercases_sha() {
        let mut payload = base_submission();
        payload["issue_number"] = json!("42");
        payload["build"] = json!({ "commit_sha": "ABC1234DEF", "pr": "7" });
        let event = validate_event(submission_from(payload)).expect("coerced");
        assert_eq!(event.issue_number, 42);
        let build = event.build.expect("build");
        assert_eq!(build.commit_sha, "abc1234def");
        assert_eq!(build.pr, Some(7));
    }

    #[test]
    fn unit_validate_event_rejects_non_hex_or_short_commit_sha() {
        let mut payload = base_submission();
        payload["build"] = json!({ "commit_sha": "xyz-not-hex" });
        assert!(validate_event(submission_from(payload)).is_err());

        let mut payload = base_submission();
        payload["build"] = json!({ "commit_sha": "abc12" });
        assert!(validate_event(submission_from(payload)).is_err());
    }

    #[test]
    fn functional_validate_event_requires_triage_fields_on_fail() {
        let mut payload = base_submission();
        payload["overall_verdict"] = json!("FAIL");
        let error = validate_event(submission_from(payload.clone())).expect_err("no severity");
        assert!(error.to_string().contains("severity"));

        payload["severity"] = json!("P1");
        let error = validate_event(submission_from(payload.clone())).expect_err("no repro");
        assert!(error.to_string().contains("repro_steps"));

        payload["repro_steps"] = json!("open the page");
        payload["expected"] = json!("loads");
        payload["actual"] = json!("500s");
        let event = validate_event(submission_from(payload)).expect("complete triage");
        assert_eq!(event.overall_verdict, Some(Verdict::Fail));
    }

    #[test]
    fn functional_validate_event_checks_scope_results() {
        let mut payload = base_submission();
        payload["scope_results"] = json!([]);
        assert!(validate_event(submission_from(payload)).is_err());

        let mut payload = base_submission();
        payload["scope_results"] = json!([{ "id": "login", "status": "PASS" }]);
        let event = validate_event(submission_from(payload)).expect("scopes");
        let scopes = event.scope_results.expect("present");
        assert_eq!(scopes[0].status, ScopeStatus::Pass);

        let mut payload = base_submission();
        payload["scope_results"] = json!([{ "id": "login", "status": "MAYBE" }]);
        assert!(validate_event(submission_from(payload)).is_err());
    }

    #[test]
    fn regression_validate_event_preserves_unknown_fields() {
        let mut payload = base_submission();
        payload["x_custom_field"] = json!({ "nested": true });
        let event = validate_event(submission_from(payload)).expect("valid");
        assert_eq!(event.extra.get("x_custom_field"), Some(&json!({ "nested": true })));
    }

    #[test]
    fn unit_validate_event_rejects_unknown_enums() {
        let mut payload = base_submission();
        payload["role"] = json!("INTERN");
        assert!(validate_event(submission_from(payload)).is_err());

        let mut payload = base_submission();
        payload["environment"] = json!("staging");
        assert!(validate_event(submission_from(payload)).is_err());

        let mut payload = base_submission();
        payload["overall_verdict"] = json!("MAYBE");
        assert!(validate_event(submission_from(payload)).is_err());
    }
}
