// eval/graph.rs — Editor graph → indexed evaluation snapshot
//
// Parses the flat { nodes, connections } lists the node editor produces into
// an immutable graph indexed by dense node position. Every input port is
// resolved to its source once, at construction time, so evaluation never
// scans the connection list or hashes a string.
//
// Node order is the order supplied by the editor. It decides which node is
// the output when several claim the role, and which connection wins when
// more than one lands on the same input port (first one wins).

use crate::eval::compiled::{Operator, OperatorKind, PORT_OUT};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// A named port on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePort {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl NodePort {
    pub fn new(id: &str) -> Self {
        NodePort {
            id: id.to_string(),
            label: id.to_string(),
        }
    }
}

/// A node as sent by the editor.
///
/// Editor-only fields (`title`, `x`, `y`) round-trip but are never read by
/// the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub node_type: OperatorKind,
    #[serde(default)]
    pub params: HashMap<String, f64>,
    /// Declared input ports. Empty means "use the kind's canonical ports".
    #[serde(default)]
    pub inputs: Vec<NodePort>,
    #[serde(default)]
    pub outputs: Vec<NodePort>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl GraphNode {
    /// Node with canonical ports and no parameters.
    pub fn new(id: &str, kind: OperatorKind) -> Self {
        GraphNode {
            id: id.to_string(),
            title: String::new(),
            node_type: kind,
            params: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn with_param(mut self, key: &str, value: f64) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn with_inputs(mut self, port_ids: &[&str]) -> Self {
        self.inputs = port_ids.iter().map(|id| NodePort::new(id)).collect();
        self
    }

    /// Input port ids in slot order: declared ports, or the canonical ones.
    pub fn input_port_ids(&self) -> impl Iterator<Item = &str> {
        let declared = self.inputs.iter().map(|p| p.id.as_str());
        let canonical = self
            .node_type
            .canonical_inputs()
            .iter()
            .copied()
            .take(if self.inputs.is_empty() { usize::MAX } else { 0 });
        declared.chain(canonical)
    }
}

/// One end of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRef {
    pub node_id: String,
    pub port_id: String,
}

/// Directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    pub from: PortRef,
    pub to: PortRef,
}

impl Connection {
    pub fn new(from_node: &str, from_port: &str, to_node: &str, to_port: &str) -> Self {
        Connection {
            id: format!("{from_node}:{from_port}->{to_node}:{to_port}"),
            from: PortRef {
                node_id: from_node.to_string(),
                port_id: from_port.to_string(),
            },
            to: PortRef {
                node_id: to_node.to_string(),
                port_id: to_port.to_string(),
            },
        }
    }

    /// Connect `from_node`'s canonical output to `to_node`'s `to_port`.
    pub fn link(from_node: &str, to_node: &str, to_port: &str) -> Self {
        Connection::new(from_node, PORT_OUT, to_node, to_port)
    }
}

// ── Resolved inputs ─────────────────────────────────────────────────

/// Where an input slot takes its field from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Nothing connected.
    Absent,
    /// Connected to the node at this dense index.
    Node(u32),
    /// Connected, but the source node id is not in the graph.
    Dangling,
}

/// One resolved input slot of a node.
#[derive(Debug, Clone)]
pub struct InputSlot {
    pub port_id: String,
    pub source: InputSource,
    /// Source id as written on the connection (kept for diagnostics).
    pub source_id: Option<String>,
    /// Connections to this port beyond the first, which are ignored.
    pub ignored: usize,
}

/// Per-node resolved input slots, in the operator's slot order.
pub type ResolvedInputs = SmallVec<[InputSlot; 2]>;

/// Immutable, indexed snapshot of an editor graph.
pub struct EvalGraph {
    /// Nodes in supplied order. Index = dense node index.
    pub node_list: Vec<GraphNode>,
    /// Node id → dense index. The first node wins on duplicate ids.
    pub id_to_idx: FxHashMap<String, usize>,
    /// Per-node typed operator.
    pub operators: Vec<Operator>,
    /// Per-node resolved input slots.
    pub resolved: Vec<ResolvedInputs>,
    /// First node of kind `output`, if any.
    pub output_idx: Option<usize>,
    /// Connection count of the source snapshot.
    pub connection_count: usize,
}

impl EvalGraph {
    /// Build an `EvalGraph` from the editor's nodes and connections.
    ///
    /// Never fails: dangling references, duplicate inputs and cycles are
    /// all representable and handled during evaluation.
    pub fn from_raw(nodes: Vec<GraphNode>, connections: Vec<Connection>) -> Self {
        // ── 1. Dense index ──

        let mut id_to_idx: FxHashMap<String, usize> = FxHashMap::default();
        for (idx, node) in nodes.iter().enumerate() {
            id_to_idx.entry(node.id.clone()).or_insert(idx);
        }

        // ── 2. Connections grouped by target port, in supplied order ──

        let mut by_target: FxHashMap<(&str, &str), SmallVec<[&Connection; 1]>> =
            FxHashMap::default();
        for conn in &connections {
            by_target
                .entry((conn.to.node_id.as_str(), conn.to.port_id.as_str()))
                .or_default()
                .push(conn);
        }

        // ── 3. Resolve each node's input slots ──

        let resolved: Vec<ResolvedInputs> = nodes
            .iter()
            .map(|node| {
                node.input_port_ids()
                    .take(node.node_type.input_arity())
                    .map(|port_id| {
                        let hits = by_target.get(&(node.id.as_str(), port_id));
                        match hits.and_then(|h| h.first()) {
                            None => InputSlot {
                                port_id: port_id.to_string(),
                                source: InputSource::Absent,
                                source_id: None,
                                ignored: 0,
                            },
                            Some(conn) => {
                                let source = match id_to_idx.get(&conn.from.node_id) {
                                    Some(&idx) => InputSource::Node(idx as u32),
                                    None => InputSource::Dangling,
                                };
                                InputSlot {
                                    port_id: port_id.to_string(),
                                    source,
                                    source_id: Some(conn.from.node_id.clone()),
                                    ignored: hits.map_or(0, |h| h.len() - 1),
                                }
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        // ── 4. Typed operators and output lookup ──

        let operators: Vec<Operator> = nodes
            .iter()
            .map(|n| Operator::compile(n.node_type, &n.params))
            .collect();

        let output_idx = nodes
            .iter()
            .position(|n| n.node_type == OperatorKind::Output);

        let connection_count = connections.len();

        EvalGraph {
            node_list: nodes,
            id_to_idx,
            operators,
            resolved,
            output_idx,
            connection_count,
        }
    }

    /// Number of nodes in the graph.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_list.len()
    }

    /// Look up the dense index for a node id. Returns `None` if not found.
    #[inline]
    pub fn idx_of(&self, id: &str) -> Option<usize> {
        self.id_to_idx.get(id).copied()
    }

    #[inline]
    pub fn node_id(&self, idx: usize) -> &str {
        &self.node_list[idx].id
    }
}
