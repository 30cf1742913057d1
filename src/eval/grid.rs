// eval/grid.rs — Heightmap evaluation entry points
//
// Validates the requested grid, locates the graph's output node and runs
// one of the two evaluation paths:
//
//   * `Strategy::Recursive`: depth-first `nodes::resolve`, nodes one at a
//     time, each kernel row-parallel.
//   * `Strategy::Scheduled`: `schedule::plan` + level-parallel execution;
//     independent subtrees also run concurrently.
//
// Both paths return bit-identical values for the same inputs.

use crate::error::{EvalError, Result};
use crate::eval::cancel::CancelToken;
use crate::eval::diagnostics::{EvalObserver, EvalReport, NoopObserver};
use crate::eval::graph::EvalGraph;
use crate::eval::{nodes, schedule};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Upper bound on cells per field (64 Mi cells = 256 MiB per f32 field).
pub const MAX_CELLS: usize = 1 << 26;

/// Validated grid size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
}

impl GridDims {
    /// Accepts signed input so callers can forward whatever they were given;
    /// zero, negative and oversized grids are rejected.
    pub fn new(width: i64, height: i64) -> Result<Self> {
        let invalid = || EvalError::InvalidDimensions { width, height };
        if width <= 0 || height <= 0 {
            return Err(invalid());
        }
        let w = u32::try_from(width).map_err(|_| invalid())?;
        let h = u32::try_from(height).map_err(|_| invalid())?;
        match (w as usize).checked_mul(h as usize) {
            Some(cells) if cells <= MAX_CELLS => Ok(GridDims {
                width: w,
                height: h,
            }),
            _ => Err(invalid()),
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Which evaluation path to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Recursive,
    #[default]
    Scheduled,
}

/// Per-call knobs. The default runs the scheduled path, uncancellable,
/// with no observer.
#[derive(Clone)]
pub struct EvalOptions<'a> {
    pub strategy: Strategy,
    pub cancel: CancelToken,
    pub observer: &'a dyn EvalObserver,
}

static NOOP_OBSERVER: NoopObserver = NoopObserver;

impl Default for EvalOptions<'_> {
    fn default() -> Self {
        EvalOptions {
            strategy: Strategy::default(),
            cancel: CancelToken::default(),
            observer: &NOOP_OBSERVER,
        }
    }
}

impl<'a> EvalOptions<'a> {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn EvalObserver) -> Self {
        self.observer = observer;
        self
    }
}

/// Result of evaluating a graph over a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heightmap {
    pub width: u32,
    pub height: u32,
    /// Row-major values. Length = width × height.
    pub values: Vec<f32>,
    /// Minimum value in the result (for normalization).
    pub min_value: f32,
    /// Maximum value in the result (for normalization).
    pub max_value: f32,
}

impl Heightmap {
    pub fn from_values(dims: GridDims, values: Vec<f32>) -> Self {
        let (min_value, max_value) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Heightmap {
            width: dims.width,
            height: dims.height,
            values,
            min_value,
            max_value,
        }
    }

    /// Value at column `x`, row `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// A heightmap plus what the evaluator absorbed producing it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub heightmap: Heightmap,
    pub report: EvalReport,
}

/// Evaluate `graph` over a `width × height` grid with default options.
///
/// `Ok(None)` means the graph has no output node: nothing to show yet.
pub fn evaluate_heightmap(
    graph: &EvalGraph,
    width: u32,
    height: u32,
    seed: i32,
) -> Result<Option<Heightmap>> {
    let dims = GridDims::new(width as i64, height as i64)?;
    Ok(evaluate_heightmap_with(graph, dims, seed, &EvalOptions::default())?
        .map(|eval| eval.heightmap))
}

/// Evaluate `graph` with explicit options, returning the anomaly report.
pub fn evaluate_heightmap_with(
    graph: &EvalGraph,
    dims: GridDims,
    seed: i32,
    options: &EvalOptions,
) -> Result<Option<Evaluation>> {
    let start = Instant::now();
    let result = match options.strategy {
        Strategy::Recursive => nodes::evaluate_recursive(graph, dims, seed, options)?,
        Strategy::Scheduled => schedule::evaluate_scheduled(graph, dims, seed, options)?,
    };

    let Some((values, report)) = result else {
        tracing::debug!(nodes = graph.node_count(), "no output node; nothing to evaluate");
        return Ok(None);
    };

    tracing::debug!(
        width = dims.width,
        height = dims.height,
        seed,
        strategy = ?options.strategy,
        nodes_evaluated = report.nodes_evaluated,
        issues = report.issues.len(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "heightmap evaluated"
    );

    Ok(Some(Evaluation {
        heightmap: Heightmap::from_values(dims, values),
        report,
    }))
}
