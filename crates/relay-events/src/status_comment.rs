use relay_core::clock_hhmm;

use crate::event_payload::ScopeResult;
use crate::provenance::{short_sha, Provenance};

/// Identity marker for the rolling status comment. The first line of every
/// rendered body, byte-exact, and the sole signal used by marker scans.
pub const ROLLING_STATUS_MARKER: &str = "<!-- RELAY_STATUS v2 -->";

/// Inputs for the rolling status comment. Rendering is a pure function of
/// this context; identical contexts render byte-identical bodies.
#[derive(Debug, Clone, Default)]
pub struct StatusCommentContext {
    pub issue_number: u64,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub environment: Option<String>,
    pub build_pr: Option<u64>,
    pub build_commit_sha: Option<String>,
    pub provenance: Provenance,
    pub latest_dev_summary: Option<String>,
    pub latest_qa: Option<QaResultView>,
    pub recent_activity: Vec<ActivityLine>,
}

/// Rendered view of the newest QA-family event.
#[derive(Debug, Clone, Default)]
pub struct QaResultView {
    pub verdict: Option<String>,
    pub scope_results: Vec<ScopeResult>,
    pub evidence_urls: Vec<String>,
}

/// One line of the recent-activity section.
#[derive(Debug, Clone)]
pub struct ActivityLine {
    pub occurred_at: String,
    pub event_type: String,
    pub agent: String,
}

pub fn render_status_comment(context: &StatusCommentContext) -> String {
    let mut lines = vec![
        ROLLING_STATUS_MARKER.to_string(),
        format!("## Relay Status — ISSUE #{}", context.issue_number),
        String::new(),
        "### Current State".to_string(),
        format!("- Status: {}", derive_status(&context.labels)),
        format!("- Labels: {}", render_labels(&context.labels)),
        format!("- Owner: {}", render_owner(context.assignee.as_deref())),
        String::new(),
        "### Build Provenance".to_string(),
        format!(
            "- Environment: {}",
            context.environment.as_deref().unwrap_or("n/a")
        ),
        format!(
            "- PR: {}",
            context
                .build_pr
                .map(|pr| format!("#{pr}"))
                .unwrap_or_else(|| "n/a".to_string())
        ),
        format!(
            "- Commit: {}",
            context
                .build_commit_sha
                .as_deref()
                .map(|sha| format!("`{}`", short_sha(sha)))
                .unwrap_or_else(|| "n/a".to_string())
        ),
        format!("- Provenance: {}", render_provenance(&context.provenance)),
        String::new(),
        "### Latest Dev Update".to_string(),
        context
            .latest_dev_summary
            .clone()
            .unwrap_or_else(|| "n/a".to_string()),
        String::new(),
        "### Latest QA Result".to_string(),
    ];
    render_qa_section(&mut lines, context.latest_qa.as_ref());
    lines.push(String::new());
    lines.push("### Recent Activity".to_string());
    if context.recent_activity.is_empty() {
        lines.push("- n/a".to_string());
    } else {
        for activity in &context.recent_activity {
            lines.push(format!(
                "- {} — {} — {}",
                clock_hhmm(&activity.occurred_at),
                activity.event_type,
                activity.agent
            ));
        }
    }
    lines.join("\n")
}

fn derive_status(labels: &[String]) -> String {
    labels
        .iter()
        .find_map(|label| label.strip_prefix("status:"))
        .unwrap_or("unknown")
        .to_string()
}

fn render_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        "none".to_string()
    } else {
        labels.join(", ")
    }
}

fn render_owner(assignee: Option<&str>) -> String {
    match assignee {
        Some(login) => format!("@{login}"),
        None => "unassigned".to_string(),
    }
}

fn render_provenance(provenance: &Provenance) -> String {
    match provenance {
        Provenance::NotApplicable => "n/a".to_string(),
        Provenance::Verified => "VERIFIED (matches PR head)".to_string(),
        Provenance::Unverified { pr_head_sha } => {
            format!("UNVERIFIED (PR head: `{}`)", short_sha(pr_head_sha))
        }
    }
}

fn render_qa_section(lines: &mut Vec<String>, latest_qa: Option<&QaResultView>) {
    let Some(qa) = latest_qa else {
        lines.push("n/a".to_string());
        return;
    };
    lines.push(format!(
        "- Verdict: {}",
        qa.verdict
            .as_deref()
            .map(|verdict| format!("`{verdict}`"))
            .unwrap_or_else(|| "n/a".to_string())
    ));
    if qa.scope_results.is_empty() {
        lines.push("- Scope: n/a".to_string());
    } else {
        lines.push("- Scope:".to_string());
        for scope in &qa.scope_results {
            let mut line = format!("  - {}: {}", scope.id, scope.status.as_str());
            if let Some(notes) = scope.notes.as_deref() {
                line.push_str(&format!(" ({notes})"));
            }
            lines.push(line);
        }
    }
    lines.push(format!(
        "- Evidence: {}",
        if qa.evidence_urls.is_empty() {
            "n/a".to_string()
        } else {
            qa.evidence_urls.join(", ")
        }
    ));
}

#[cfg(test)]
mod tests {
    use super::{
        render_status_comment, ActivityLine, QaResultView, StatusCommentContext,
        ROLLING_STATUS_MARKER,
    };
    use crate::event_payload::{ScopeResult, ScopeStatus};
    use crate::provenance::Provenance;

    fn sample_context() -> StatusCommentContext {
        StatusCommentContext {
            issue_number: 42,
            labels: vec!["status:qa".to_string(), "prio:P1".to_string()],
            assignee: Some("dev-1".to_string()),
            environment: Some("preview".to_string()),
            build_pr: Some(7),
            build_commit_sha: Some("abc1234def".to_string()),
            provenance: Provenance::Verified,
            latest_dev_summary: Some("wired up the login flow".to_string()),
            latest_qa: Some(QaResultView {
                verdict: Some("PASS".to_string()),
                scope_results: vec![ScopeResult {
                    id: "login".to_string(),
                    status: ScopeStatus::Pass,
                    notes: Some("2 retries".to_string()),
                }],
                evidence_urls: vec!["https://evidence.example/a".to_string()],
            }),
            recent_activity: vec![ActivityLine {
                occurred_at: "2026-01-01T12:30:00Z".to_string(),
                event_type: "qa.result_submitted".to_string(),
                agent: "qa-bot".to_string(),
            }],
        }
    }

    #[test]
    fn unit_render_starts_with_the_marker_line() {
        let body = render_status_comment(&sample_context());
        let first_line = body.lines().next().expect("first line");
        assert_eq!(first_line, ROLLING_STATUS_MARKER);
        assert!(body.contains("## Relay Status — ISSUE #42"));
    }

    #[test]
    fn functional_render_covers_every_section() {
        let body = render_status_comment(&sample_context());
        assert!(body.contains("- Status: qa"));
        assert!(body.contains("- Labels: status:qa, prio:P1"));
        assert!(body.contains("- Owner: @dev-1"));
        assert!(body.contains("- Environment: preview"));
        assert!(body.contains("- PR: #7"));
        assert!(body.contains("- Commit: `abc1234`"));
        assert!(body.contains("- Provenance: VERIFIED (matches PR head)"));
        assert!(body.contains("wired up the login flow"));
        assert!(body.contains("- Verdict: `PASS`"));
        assert!(body.contains("  - login: PASS (2 retries)"));
        assert!(body.contains("- Evidence: https://evidence.example/a"));
        assert!(body.contains("- 12:30Z — qa.result_submitted — qa-bot"));
    }

    #[test]
    fn functional_render_unverified_provenance_shows_short_head() {
        let mut context = sample_context();
        context.provenance = Provenance::Unverified {
            pr_head_sha: "ffffffffff".to_string(),
        };
        let body = render_status_comment(&context);
        assert!(body.contains("UNVERIFIED (PR head: `fffffff`)"));
    }

    #[test]
    fn functional_render_falls_back_to_na_everywhere() {
        let body = render_status_comment(&StatusCommentContext {
            issue_number: 9,
            ..StatusCommentContext::default()
        });
        assert!(body.contains("- Status: unknown"));
        assert!(body.contains("- Labels: none"));
        assert!(body.contains("- Owner: unassigned"));
        assert!(body.contains("- Environment: n/a"));
        assert!(body.contains("- PR: n/a"));
        assert!(body.contains("- Commit: n/a"));
        assert!(body.contains("- Provenance: n/a"));
        assert!(body.contains("### Latest Dev Update\nn/a"));
        assert!(body.contains("### Latest QA Result\nn/a"));
        assert!(body.contains("### Recent Activity\n- n/a"));
    }

    #[test]
    fn regression_render_is_byte_identical_for_identical_context() {
        let context = sample_context();
        assert_eq!(
            render_status_comment(&context),
            render_status_comment(&context)
        );
    }
}
