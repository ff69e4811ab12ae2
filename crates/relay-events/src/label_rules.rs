use std::collections::BTreeMap;

use serde::Deserialize;

use crate::event_payload::Verdict;

/// Verdict key matching events that carry no verdict, or for which no exact
/// verdict key exists.
pub const WILDCARD_VERDICT_KEY: &str = "_";

/// Labels added and removed when a transition rule matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LabelAction {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

/// Declarative label transition rules: event type, then verdict key.
///
/// The configured blob is parsed once at startup; an undecodable blob
/// degrades to an empty rule set so every transition becomes a no-op.
#[derive(Debug, Clone, Default)]
pub struct LabelRuleSet {
    rules: BTreeMap<String, BTreeMap<String, LabelAction>>,
}

impl LabelRuleSet {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let rules = serde_json::from_str(raw)?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Looks up the action for `(event_type, verdict)`: the exact effective
    /// verdict key first, then the `_` wildcard. A missing verdict matches
    /// only the wildcard.
    pub fn action_for(&self, event_type: &str, verdict: Option<Verdict>) -> Option<&LabelAction> {
        let by_verdict = self.rules.get(event_type)?;
        if let Some(verdict) = verdict {
            if let Some(action) = by_verdict.get(verdict.as_str()) {
                return Some(action);
            }
        }
        by_verdict.get(WILDCARD_VERDICT_KEY)
    }
}

/// Computes `next = (current ∪ add) \ remove`.
///
/// Current order is preserved, additions append in rule order, and labels
/// mentioned in no rule pass through untouched.
pub fn compute_next_labels(current: &[String], action: &LabelAction) -> Vec<String> {
    let mut next = Vec::with_capacity(current.len() + action.add.len());
    for label in current {
        if action.remove.contains(label) || next.contains(label) {
            continue;
        }
        next.push(label.clone());
    }
    for label in &action.add {
        if action.remove.contains(label) || next.contains(label) {
            continue;
        }
        next.push(label.clone());
    }
    next
}

#[cfg(test)]
mod tests {
    use super::{compute_next_labels, LabelAction, LabelRuleSet};
    use crate::event_payload::Verdict;

    fn qa_rules() -> LabelRuleSet {
        LabelRuleSet::parse(
            r#"{
                "qa.result_submitted": {
                    "PASS": { "add": ["status:verified"], "remove": ["status:qa"] },
                    "FAIL": { "add": ["status:rejected"], "remove": ["status:qa"] },
                    "_": { "add": ["status:qa-seen"] }
                }
            }"#,
        )
        .expect("parse rules")
    }

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|label| label.to_string()).collect()
    }

    #[test]
    fn unit_parse_rejects_malformed_blob() {
        assert!(LabelRuleSet::parse("not json").is_err());
        assert!(LabelRuleSet::parse(r#"{"a": {"PASS": {"add": "oops"}}}"#).is_err());
    }

    #[test]
    fn functional_action_lookup_prefers_exact_verdict_then_wildcard() {
        let rules = qa_rules();
        let pass = rules
            .action_for("qa.result_submitted", Some(Verdict::Pass))
            .expect("pass rule");
        assert_eq!(pass.add, labels(&["status:verified"]));

        let blocked = rules
            .action_for("qa.result_submitted", Some(Verdict::Blocked))
            .expect("wildcard fallback");
        assert_eq!(blocked.add, labels(&["status:qa-seen"]));

        let none = rules
            .action_for("qa.result_submitted", None)
            .expect("null verdict hits wildcard only");
        assert_eq!(none.add, labels(&["status:qa-seen"]));

        assert!(rules.action_for("dev.update", Some(Verdict::Pass)).is_none());
    }

    #[test]
    fn functional_compute_next_labels_unions_then_subtracts() {
        let rules = qa_rules();
        let action = rules
            .action_for("qa.result_submitted", Some(Verdict::Pass))
            .expect("rule");
        let next = compute_next_labels(&labels(&["status:qa", "prio:P1"]), action);
        assert_eq!(next, labels(&["prio:P1", "status:verified"]));
    }

    #[test]
    fn regression_compute_next_labels_dedupes_and_lets_remove_win() {
        let action = LabelAction {
            add: labels(&["a", "a", "b"]),
            remove: labels(&["b", "c"]),
        };
        let next = compute_next_labels(&labels(&["a", "c", "keep"]), &action);
        assert_eq!(next, labels(&["a", "keep"]));
    }

    #[test]
    fn unit_empty_rule_set_is_a_no_op() {
        let rules = LabelRuleSet::default();
        assert!(rules.is_empty());
        assert!(rules.action_for("qa.result_submitted", Some(Verdict::Pass)).is_none());
    }
}
