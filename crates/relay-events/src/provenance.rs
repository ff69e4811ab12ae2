use crate::event_payload::Verdict;

/// Result of comparing a reported build commit against the PR head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Provenance {
    /// The event carried no `(pr, commit_sha)` pair; verification does not
    /// apply.
    #[default]
    NotApplicable,
    Verified,
    Unverified {
        pr_head_sha: String,
    },
}

impl Provenance {
    /// The tri-state flag reported to callers: `null` / `true` / `false`.
    pub fn verified_flag(&self) -> Option<bool> {
        match self {
            Self::NotApplicable => None,
            Self::Verified => Some(true),
            Self::Unverified { .. } => Some(false),
        }
    }
}

/// Case-insensitive comparison of the reported commit against the PR head.
pub fn compare_reported_commit(reported_sha: &str, pr_head_sha: &str) -> Provenance {
    if reported_sha.eq_ignore_ascii_case(pr_head_sha) {
        Provenance::Verified
    } else {
        Provenance::Unverified {
            pr_head_sha: pr_head_sha.to_ascii_lowercase(),
        }
    }
}

/// Applies the downgrade rule: a reported `PASS` becomes `PASS_UNVERIFIED`
/// when the commit did not match the PR head. Every other verdict, and every
/// other provenance outcome, passes through unchanged.
pub fn effective_verdict(
    reported: Option<Verdict>,
    provenance: &Provenance,
) -> Option<Verdict> {
    match (reported, provenance) {
        (Some(Verdict::Pass), Provenance::Unverified { .. }) => Some(Verdict::PassUnverified),
        (other, _) => other,
    }
}

/// First seven characters of a SHA, used in rendered provenance lines.
pub fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}
