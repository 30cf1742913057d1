// eval/compiled.rs — Typed operators compiled from the editor's parameter bag
//
// The editor ships each node as `nodeType` + a loose `params` map. At graph
// construction time both are folded into a closed `Operator` enum carrying
// strongly-typed parameters with their defaults already applied, so the
// evaluation dispatch is one exhaustive match with no key lookups.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Parameter defaults ──────────────────────────────────────────────

pub const DEFAULT_NOISE_SCALE: f64 = 2.0;
pub const DEFAULT_NOISE_AMPLITUDE: f64 = 1.0;
pub const DEFAULT_CLAMP_MIN: f64 = 0.0;
pub const DEFAULT_CLAMP_MAX: f64 = 1.0;

// ── Canonical port ids ──────────────────────────────────────────────
// Used when a node arrives without its own port list.

pub const PORT_A: &str = "a";
pub const PORT_B: &str = "b";
pub const PORT_IN: &str = "in";
pub const PORT_OUT: &str = "out";

/// Operator kind as named on the wire (`nodeType`).
///
/// Unrecognised kinds deserialize to `Unknown` and evaluate to zero, so a
/// newer editor can add kinds without breaking older evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    Noise,
    Add,
    Multiply,
    Clamp,
    Output,
    #[serde(other)]
    Unknown,
}

impl OperatorKind {
    /// Number of input slots this kind reads.
    pub fn input_arity(self) -> usize {
        match self {
            OperatorKind::Add | OperatorKind::Multiply => 2,
            OperatorKind::Clamp | OperatorKind::Output => 1,
            OperatorKind::Noise | OperatorKind::Unknown => 0,
        }
    }

    /// Port ids assumed for nodes that do not declare their inputs.
    pub fn canonical_inputs(self) -> &'static [&'static str] {
        match self {
            OperatorKind::Add | OperatorKind::Multiply => &[PORT_A, PORT_B],
            OperatorKind::Clamp | OperatorKind::Output => &[PORT_IN],
            OperatorKind::Noise | OperatorKind::Unknown => &[],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperatorKind::Noise => "noise",
            OperatorKind::Add => "add",
            OperatorKind::Multiply => "multiply",
            OperatorKind::Clamp => "clamp",
            OperatorKind::Output => "output",
            OperatorKind::Unknown => "unknown",
        }
    }
}

/// A node's operator with all parameters resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    Noise { scale: f64, amplitude: f64 },
    Add,
    Multiply,
    Clamp { min: f64, max: f64 },
    Output,
    /// Unknown kind: ignores inputs, produces zeros.
    Inert,
}

impl Operator {
    /// Fold a kind and its raw parameter bag into a typed operator.
    ///
    /// Missing or non-finite parameters take the kind's default. Unknown
    /// parameter keys are ignored.
    pub fn compile(kind: OperatorKind, params: &HashMap<String, f64>) -> Self {
        match kind {
            OperatorKind::Noise => Operator::Noise {
                scale: param(params, "scale", DEFAULT_NOISE_SCALE),
                amplitude: param(params, "amplitude", DEFAULT_NOISE_AMPLITUDE),
            },
            OperatorKind::Add => Operator::Add,
            OperatorKind::Multiply => Operator::Multiply,
            OperatorKind::Clamp => Operator::Clamp {
                min: param(params, "min", DEFAULT_CLAMP_MIN),
                max: param(params, "max", DEFAULT_CLAMP_MAX),
            },
            OperatorKind::Output => Operator::Output,
            OperatorKind::Unknown => Operator::Inert,
        }
    }

    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::Noise { .. } => OperatorKind::Noise,
            Operator::Add => OperatorKind::Add,
            Operator::Multiply => OperatorKind::Multiply,
            Operator::Clamp { .. } => OperatorKind::Clamp,
            Operator::Output => OperatorKind::Output,
            Operator::Inert => OperatorKind::Unknown,
        }
    }
}

/// Fields are `f32`, so a value that is finite as `f64` but not as `f32`
/// is out of range too.
fn param(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .copied()
        .filter(|v| (*v as f32).is_finite())
        .unwrap_or(default)
}
