use sha2::{Digest, Sha256};

use crate::event_payload::NormalizedEvent;

/// Canonical serialization of a normalized event.
///
/// Determinism comes from three properties: struct fields serialize in
/// declaration order, absent options are omitted entirely, and every JSON
/// object (including unknown caller fields and nested `details`) serializes
/// with sorted keys. Re-submitting the same logical event therefore yields
/// the same bytes.
pub fn canonical_payload_json(event: &NormalizedEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Lowercase hex SHA-256 of the canonical payload bytes.
pub fn payload_hash(canonical_json: &str) -> String {
    format!("{:x}", Sha256::digest(canonical_json.as_bytes()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{canonical_payload_json, payload_hash};
    use crate::event_payload::EventSubmission;
    use crate::event_validation::validate_event;

    fn canonical_for(value: serde_json::Value) -> String {
        let submission: EventSubmission = serde_json::from_value(value).expect("decode");
        let event = validate_event(submission).expect("validate");
        canonical_payload_json(&event).expect("serialize")
    }

    #[test]
    fn unit_payload_hash_is_deterministic() {
        let payload = json!({
            "event_id": "evt-00000001",
            "repo": "acme/web",
            "issue_number": 42,
            "event_type": "qa.result_submitted",
            "role": "QA",
            "agent": "qa-bot",
            "overall_verdict": "PASS",
            "build": { "commit_sha": "abc1234def", "pr": 7 },
        });
        let first = payload_hash(&canonical_for(payload.clone()));
        let second = payload_hash(&canonical_for(payload));
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn functional_canonical_json_ignores_caller_key_order() {
        let ordered = json!({
            "event_id": "evt-00000001",
            "repo": "acme/web",
            "issue_number": 42,
            "event_type": "dev.update",
            "role": "DEV",
            "agent": "dev-bot",
            "details": { "alpha": 1, "beta": 2 },
            "zz_extension": true,
            "aa_extension": false,
        });
        let shuffled = json!({
            "aa_extension": false,
            "zz_extension": true,
            "details": { "beta": 2, "alpha": 1 },
            "agent": "dev-bot",
            "role": "DEV",
            "event_type": "dev.update",
            "issue_number": 42,
            "repo": "acme/web",
            "event_id": "evt-00000001",
        });
        assert_eq!(canonical_for(ordered), canonical_for(shuffled));
    }

    #[test]
    fn functional_canonical_json_reflects_coercion_not_raw_input() {
        let upper = json!({
            "event_id": "evt-00000001",
            "repo": "acme/web",
            "issue_number": "42",
            "event_type": "qa.result_submitted",
            "role": "QA",
            "agent": "qa-bot",
            "build": { "commit_sha": "ABC1234DEF" },
        });
        let lower = json!({
            "event_id": "evt-00000001",
            "repo": "acme/web",
            "issue_number": 42,
            "event_type": "qa.result_submitted",
            "role": "QA",
            "agent": "qa-bot",
            "build": { "commit_sha": "abc1234def" },
        });
        assert_eq!(canonical_for(upper), canonical_for(lower));
    }

    #[test]
    fn regression_distinct_payloads_hash_differently() {
        let qa = json!({
            "event_id": "evt-00000001",
            "repo": "acme/web",
            "issue_number": 42,
            "event_type": "qa.result_submitted",
            "role": "QA",
            "agent": "qa-bot",
        });
        let mut dev = qa.clone();
        dev["role"] = json!("DEV");
        assert_ne!(
            payload_hash(&canonical_for(qa)),
            payload_hash(&canonical_for(dev))
        );
    }
}
