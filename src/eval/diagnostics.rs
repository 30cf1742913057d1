// eval/diagnostics.rs — graph anomalies absorbed during evaluation
//
// Evaluation never fails on a malformed graph; it substitutes zeros and
// moves on. What it substituted is collected here so the editor can point
// the user at the offending port if it wants to.

use crate::eval::compiled::OperatorKind;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GraphIssue {
    /// `port` on `node` closes a cycle; it was read as zeros.
    #[serde(rename_all = "camelCase")]
    CycleBroken { node: String, port: String },
    /// `port` on `node` is connected from `source`, which does not exist.
    #[serde(rename_all = "camelCase")]
    DanglingSource {
        node: String,
        port: String,
        source: String,
    },
    /// `ignored` extra connections land on `port`; only the first is used.
    #[serde(rename_all = "camelCase")]
    DuplicateInput {
        node: String,
        port: String,
        ignored: usize,
    },
}

/// Summary of one evaluation call.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalReport {
    pub issues: Vec<GraphIssue>,
    /// Nodes whose field was actually computed.
    pub nodes_evaluated: usize,
}

impl EvalReport {
    pub fn has_cycles(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, GraphIssue::CycleBroken { .. }))
    }

    pub(crate) fn push(&mut self, issue: GraphIssue) {
        tracing::debug!(?issue, "absorbed graph issue");
        self.issues.push(issue);
    }
}

/// Hook fired once per computed node. Used for instrumentation and tests.
pub trait EvalObserver: Sync {
    fn on_node_evaluated(&self, node_id: &str, kind: OperatorKind);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl EvalObserver for NoopObserver {
    #[inline]
    fn on_node_evaluated(&self, _node_id: &str, _kind: OperatorKind) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_serializes_with_kind_tag() {
        let issue = GraphIssue::CycleBroken {
            node: "a".into(),
            port: "in".into(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "cycleBroken");
        assert_eq!(json["node"], "a");
    }

    #[test]
    fn has_cycles_only_for_cycle_issues() {
        let mut report = EvalReport::default();
        report.push(GraphIssue::DuplicateInput {
            node: "o".into(),
            port: "in".into(),
            ignored: 2,
        });
        assert!(!report.has_cycles());
        report.push(GraphIssue::CycleBroken {
            node: "o".into(),
            port: "in".into(),
        });
        assert!(report.has_cycles());
    }
}
