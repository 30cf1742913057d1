// eval/nodes.rs — Operator kernels and the recursive graph evaluator
//
// Each node produces a whole field (one f32 per grid cell). Kernels run
// row-parallel with rayon and poll the cancel token once per row.
//
// `resolve` walks the graph depth-first from a node, memoizing every field
// it computes for the rest of the call. A node that is reached again while
// it is still on the traversal stack closes a cycle; that read yields zeros
// and evaluation carries on.

use crate::error::Result;
use crate::eval::cancel::CancelToken;
use crate::eval::compiled::Operator;
use crate::eval::diagnostics::{EvalObserver, EvalReport, GraphIssue};
use crate::eval::graph::{EvalGraph, InputSlot, InputSource};
use crate::eval::grid::{EvalOptions, GridDims};
use crate::eval::noise;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;

/// A computed node field, shared between the memo and its consumers.
pub type Field = Arc<Vec<f32>>;

// ── Row-parallel helpers ────────────────────────────────────────────

fn fill_rows<F>(out: &mut [f32], width: usize, cancel: &CancelToken, f: F) -> Result<()>
where
    F: Fn(usize, &mut [f32]) + Sync + Send,
{
    out.par_chunks_mut(width)
        .enumerate()
        .try_for_each(|(y, row)| {
            cancel.check()?;
            f(y, row);
            Ok(())
        })
}

fn map_rows<F>(out: &mut [f32], a: &[f32], width: usize, cancel: &CancelToken, f: F) -> Result<()>
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    out.par_chunks_mut(width)
        .zip(a.par_chunks(width))
        .try_for_each(|(row, a_row)| {
            cancel.check()?;
            for (o, &v) in row.iter_mut().zip(a_row) {
                *o = f(v);
            }
            Ok(())
        })
}

fn zip_rows<F>(
    out: &mut [f32],
    a: &[f32],
    b: &[f32],
    width: usize,
    cancel: &CancelToken,
    f: F,
) -> Result<()>
where
    F: Fn(f32, f32) -> f32 + Sync + Send,
{
    out.par_chunks_mut(width)
        .zip(a.par_chunks(width))
        .zip(b.par_chunks(width))
        .try_for_each(|((row, a_row), b_row)| {
            cancel.check()?;
            for ((o, &x), &y) in row.iter_mut().zip(a_row).zip(b_row) {
                *o = f(x, y);
            }
            Ok(())
        })
}

// ── Operator dispatch ───────────────────────────────────────────────

/// Compute one node's field from its (already resolved) inputs.
///
/// `inputs[i]` is `None` when slot `i` has nothing connected. Slots that
/// closed a cycle or point at a missing node arrive as zero fields, not
/// `None`, which matters for the single-input fallbacks below.
pub fn apply_operator(
    op: &Operator,
    node_id: &str,
    inputs: &[Option<&[f32]>],
    dims: GridDims,
    seed: i32,
    cancel: &CancelToken,
) -> Result<Vec<f32>> {
    let start = Instant::now();
    let width = dims.width as usize;
    let mut out = vec![0.0f32; dims.cell_count()];
    let input = |slot: usize| inputs.get(slot).copied().flatten();

    match *op {
        Operator::Noise { scale, amplitude } => {
            let node_seed = noise::node_seed(seed, node_id);
            fill_rows(&mut out, width, cancel, |y, row| {
                let ny = noise::cell_coord(y as u32, dims.height);
                for (x, cell) in row.iter_mut().enumerate() {
                    let nx = noise::cell_coord(x as u32, dims.width);
                    *cell = noise::fractal_noise(nx, ny, node_seed, scale, amplitude) as f32;
                }
            })?;
        }

        Operator::Add => match (input(0), input(1)) {
            (Some(a), Some(b)) => zip_rows(&mut out, a, b, width, cancel, |x, y| x + y)?,
            (Some(a), None) | (None, Some(a)) => out.copy_from_slice(a),
            (None, None) => {}
        },

        // Only the first input passes through on its own; a lone second
        // input yields zeros.
        Operator::Multiply => match (input(0), input(1)) {
            (Some(a), Some(b)) => zip_rows(&mut out, a, b, width, cancel, |x, y| x * y)?,
            (Some(a), None) => out.copy_from_slice(a),
            _ => {}
        },

        // max-then-min rather than f64::clamp: an inverted range must not panic.
        Operator::Clamp { min, max } => {
            if let Some(a) = input(0) {
                map_rows(&mut out, a, width, cancel, |v| {
                    (v as f64).max(min).min(max) as f32
                })?;
            }
        }

        Operator::Output => {
            if let Some(a) = input(0) {
                out.copy_from_slice(a);
            }
        }

        Operator::Inert => {}
    }

    tracing::debug!(
        node = node_id,
        kind = op.kind().as_str(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "node evaluated"
    );
    Ok(out)
}

/// Record the static anomalies of a slot (dangling source, duplicates).
pub(crate) fn note_slot_issues(
    graph: &EvalGraph,
    node_idx: usize,
    slot: &InputSlot,
    report: &mut EvalReport,
) {
    if slot.ignored > 0 {
        report.push(GraphIssue::DuplicateInput {
            node: graph.node_id(node_idx).to_string(),
            port: slot.port_id.clone(),
            ignored: slot.ignored,
        });
    }
    if slot.source == InputSource::Dangling {
        report.push(GraphIssue::DanglingSource {
            node: graph.node_id(node_idx).to_string(),
            port: slot.port_id.clone(),
            source: slot.source_id.clone().unwrap_or_default(),
        });
    }
}

pub(crate) fn cycle_issue(graph: &EvalGraph, node_idx: usize, slot: &InputSlot) -> GraphIssue {
    GraphIssue::CycleBroken {
        node: graph.node_id(node_idx).to_string(),
        port: slot.port_id.clone(),
    }
}

// ── Recursive evaluator ─────────────────────────────────────────────

/// Per-call evaluation state. Dropped when the call returns; nothing in
/// here outlives one heightmap.
pub struct EvalContext<'a> {
    pub graph: &'a EvalGraph,
    pub dims: GridDims,
    pub seed: i32,
    /// Per-node memoised field (indexed by node index).
    memo: Vec<Option<Field>>,
    /// Nodes on the current traversal stack (indexed by node index).
    visiting: Vec<bool>,
    /// Shared all-zero field, allocated on first use.
    zeros: Option<Field>,
    cancel: CancelToken,
    observer: &'a dyn EvalObserver,
    pub report: EvalReport,
}

impl<'a> EvalContext<'a> {
    pub fn new(graph: &'a EvalGraph, dims: GridDims, seed: i32, options: &EvalOptions<'a>) -> Self {
        let node_count = graph.node_count();
        EvalContext {
            graph,
            dims,
            seed,
            memo: vec![None; node_count],
            visiting: vec![false; node_count],
            zeros: None,
            cancel: options.cancel.clone(),
            observer: options.observer,
            report: EvalReport::default(),
        }
    }

    fn zeros(&mut self) -> Field {
        let cells = self.dims.cell_count();
        Arc::clone(self.zeros.get_or_insert_with(|| Arc::new(vec![0.0; cells])))
    }

    /// Memoised field for a node, if it was computed in this call.
    pub fn memoized(&self, node_idx: usize) -> Option<&Field> {
        self.memo.get(node_idx).and_then(Option::as_ref)
    }
}

/// A node whose inputs are still being resolved. `inputs.len()` is the
/// index of the next slot to resolve.
struct Frame {
    node_idx: usize,
    inputs: SmallVec<[Option<Field>; 2]>,
}

/// Memo hit or cycle read for `node_idx`, or push a frame for it.
fn enter(
    ctx: &mut EvalContext,
    stack: &mut Vec<Frame>,
    node_idx: usize,
) -> Result<Option<Field>> {
    if let Some(field) = &ctx.memo[node_idx] {
        return Ok(Some(Arc::clone(field)));
    }
    if ctx.visiting[node_idx] {
        return Ok(Some(ctx.zeros()));
    }

    ctx.cancel.check()?;
    ctx.visiting[node_idx] = true;
    stack.push(Frame {
        node_idx,
        inputs: SmallVec::new(),
    });
    Ok(None)
}

/// Compute a node once all of its inputs are resolved.
fn finish(ctx: &mut EvalContext, node_idx: usize, inputs: &[Option<Field>]) -> Result<Field> {
    let graph = ctx.graph;
    let views: SmallVec<[Option<&[f32]>; 2]> =
        inputs.iter().map(|f| f.as_ref().map(|v| v.as_slice())).collect();
    let op = &graph.operators[node_idx];
    let field = Arc::new(apply_operator(
        op,
        graph.node_id(node_idx),
        &views,
        ctx.dims,
        ctx.seed,
        &ctx.cancel,
    )?);

    ctx.observer.on_node_evaluated(graph.node_id(node_idx), op.kind());
    ctx.report.nodes_evaluated += 1;

    ctx.memo[node_idx] = Some(Arc::clone(&field));
    ctx.visiting[node_idx] = false;
    Ok(field)
}

/// Evaluate `node_idx` and everything it depends on.
///
/// Depth-first over an explicit stack, so graph depth is bounded by the
/// heap rather than the thread stack. Slots are resolved in port order and
/// each node is computed as soon as its last slot is, which is the order a
/// plain recursive walk would use.
pub fn resolve(ctx: &mut EvalContext, node_idx: usize) -> Result<Field> {
    let mut stack: Vec<Frame> = Vec::new();
    if let Some(field) = enter(ctx, &mut stack, node_idx)? {
        return Ok(field);
    }

    let graph = ctx.graph;
    while let Some(frame) = stack.last_mut() {
        let node_idx = frame.node_idx;
        let Some(slot) = graph.resolved[node_idx].get(frame.inputs.len()) else {
            let inputs = std::mem::take(&mut frame.inputs);
            stack.pop();
            let field = finish(ctx, node_idx, &inputs)?;
            match stack.last_mut() {
                Some(parent) => parent.inputs.push(Some(field)),
                None => return Ok(field),
            }
            continue;
        };

        note_slot_issues(graph, node_idx, slot, &mut ctx.report);
        let input = match slot.source {
            InputSource::Absent => None,
            InputSource::Dangling => Some(ctx.zeros()),
            InputSource::Node(src) => {
                let src = src as usize;
                if ctx.visiting[src] {
                    ctx.report.push(cycle_issue(graph, node_idx, slot));
                }
                match enter(ctx, &mut stack, src)? {
                    Some(field) => Some(field),
                    // Delivered to this frame when `src` finishes.
                    None => continue,
                }
            }
        };
        if let Some(frame) = stack.last_mut() {
            frame.inputs.push(input);
        }
    }

    // The stack only empties through the root's return above.
    Ok(ctx.zeros())
}

/// Evaluate the graph's output node on the recursive path.
///
/// Returns `None` when the graph has no output node.
pub fn evaluate_recursive(
    graph: &EvalGraph,
    dims: GridDims,
    seed: i32,
    options: &EvalOptions,
) -> Result<Option<(Vec<f32>, EvalReport)>> {
    let Some(root) = graph.output_idx else {
        return Ok(None);
    };

    let mut ctx = EvalContext::new(graph, dims, seed, options);
    let field = resolve(&mut ctx, root)?;
    let report = std::mem::take(&mut ctx.report);
    drop(ctx);

    let values = Arc::try_unwrap(field).unwrap_or_else(|shared| (*shared).clone());
    Ok(Some((values, report)))
}
