use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of the agent emitting a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentRole {
    QA,
    DEV,
    PM,
    MENTOR,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QA => "QA",
            Self::DEV => "DEV",
            Self::PM => "PM",
            Self::MENTOR => "MENTOR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "QA" => Some(Self::QA),
            "DEV" => Some(Self::DEV),
            "PM" => Some(Self::PM),
            "MENTOR" => Some(Self::MENTOR),
            _ => None,
        }
    }
}

/// Outcome of a QA or DEV run. Closed set; unknown strings are rejected at
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "BLOCKED")]
    Blocked,
    #[serde(rename = "PASS_UNVERIFIED")]
    PassUnverified,
    #[serde(rename = "FAIL_UNCONFIRMED")]
    FailUnconfirmed,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Blocked => "BLOCKED",
            Self::PassUnverified => "PASS_UNVERIFIED",
            Self::FailUnconfirmed => "FAIL_UNCONFIRMED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PASS" => Some(Self::Pass),
            "FAIL" => Some(Self::Fail),
            "BLOCKED" => Some(Self::Blocked),
            "PASS_UNVERIFIED" => Some(Self::PassUnverified),
            "FAIL_UNCONFIRMED" => Some(Self::FailUnconfirmed),
            _ => None,
        }
    }

    /// FAIL and BLOCKED carry mandatory triage fields (severity, repro
    /// steps, expected, actual).
    pub fn requires_triage_fields(&self) -> bool {
        matches!(self, Self::Fail | Self::Blocked)
    }
}

/// Deployment environment a run executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEnvironment {
    #[serde(rename = "preview")]
    Preview,
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "dev")]
    Dev,
}

impl RunEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Production => "production",
            Self::Dev => "dev",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "preview" => Some(Self::Preview),
            "production" => Some(Self::Production),
            "dev" => Some(Self::Dev),
            _ => None,
        }
    }
}

/// Per-scope outcome inside a QA result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "SKIPPED")]
    Skipped,
}

impl ScopeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIPPED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PASS" => Some(Self::Pass),
            "FAIL" => Some(Self::Fail),
            "SKIPPED" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Triage severity attached to FAIL/BLOCKED verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    P0,
    P1,
    P2,
    P3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }
}

/// Raw inbound event body as submitted by an agent.
///
/// Fields are loosely typed so the validator can apply coercions (string
/// numbers, case folding) and report the first violation with a precise
/// message instead of a serde parse error. Unknown fields are captured in
/// `extra` and survive into the canonical payload untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSubmission {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub issue_number: Option<Value>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub overall_verdict: Option<String>,
    #[serde(default)]
    pub build: Option<BuildSubmission>,
    #[serde(default)]
    pub scope_results: Option<Vec<ScopeResultSubmission>>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub repro_steps: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub evidence_urls: Option<Vec<String>>,
    #[serde(default)]
    pub artifacts: Option<Value>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSubmission {
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub pr: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeResultSubmission {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated, normalized event.
///
/// Serialization of this struct IS the canonical payload: field order is
/// fixed by the declaration, absent options are omitted, and unknown caller
/// fields serialize after the named fields in deterministic key order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub event_id: String,
    pub repo: String,
    pub issue_number: u64,
    pub event_type: String,
    pub role: AgentRole,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<RunEnvironment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_verdict: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_results: Option<Vec<ScopeResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repro_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Reported build coordinates: lowercased commit SHA plus optional PR number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRef {
    pub commit_sha: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeResult {
    pub id: String,
    pub status: ScopeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
