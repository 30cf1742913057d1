// eval/schedule.rs — Level-parallel evaluation from a precomputed plan
//
// Planning replays the traversal of `nodes::resolve` without
// touching any field: same memo order, same cycle guard, same zero reads.
// What it records is, for every node the traversal would compute, where
// each input slot comes from. Nodes are then bucketed by dependency depth
// and each bucket is computed concurrently. Every node's result slot is
// written exactly once, after its whole level finishes, so no locking is
// needed and the output is bit-identical to the recursive path.

use crate::error::Result;
use crate::eval::diagnostics::EvalReport;
use crate::eval::graph::{EvalGraph, InputSource};
use crate::eval::grid::{EvalOptions, GridDims};
use crate::eval::nodes::{apply_operator, cycle_issue, note_slot_issues, Field};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::sync::Arc;

/// Where a planned node reads one input slot from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepInput {
    /// Unconnected slot.
    Absent,
    /// Zero field: the slot closes a cycle or its source is missing.
    Zero,
    /// Result of another planned node (by node index).
    Node(usize),
}

/// One node to compute.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub node_idx: usize,
    pub inputs: SmallVec<[StepInput; 2]>,
}

/// Evaluation plan rooted at one node.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Steps in the post-order the recursive evaluator would compute them.
    pub steps: Vec<PlanStep>,
    /// Step indices grouped by dependency depth; level 0 has no node inputs.
    pub levels: Vec<Vec<usize>>,
    /// Node whose result is the plan's output.
    pub root: usize,
}

struct Planner<'g> {
    graph: &'g EvalGraph,
    level_of: Vec<Option<usize>>,
    visiting: Vec<bool>,
    steps: Vec<PlanStep>,
    report: EvalReport,
}

/// A node being planned. `inputs.len()` is the next slot to plan.
struct PlanFrame {
    node_idx: usize,
    inputs: SmallVec<[StepInput; 2]>,
    level: usize,
}

impl PlanFrame {
    fn new(node_idx: usize) -> Self {
        PlanFrame {
            node_idx,
            inputs: SmallVec::new(),
            level: 0,
        }
    }

    fn push(&mut self, input: StepInput, level_of: &[Option<usize>]) {
        if let StepInput::Node(src) = input {
            if let Some(src_level) = level_of[src] {
                self.level = self.level.max(src_level + 1);
            }
        }
        self.inputs.push(input);
    }
}

impl<'g> Planner<'g> {
    /// Depth-first over an explicit stack, visiting slots in the same order
    /// as `nodes::resolve`.
    fn visit(&mut self, root: usize) {
        if self.level_of[root].is_some() || self.visiting[root] {
            return;
        }
        let graph = self.graph;
        self.visiting[root] = true;
        let mut stack = vec![PlanFrame::new(root)];

        while let Some(frame) = stack.last_mut() {
            let node_idx = frame.node_idx;
            let Some(slot) = graph.resolved[node_idx].get(frame.inputs.len()) else {
                let level = frame.level;
                let inputs = std::mem::take(&mut frame.inputs);
                stack.pop();
                self.level_of[node_idx] = Some(level);
                self.visiting[node_idx] = false;
                self.steps.push(PlanStep { node_idx, inputs });
                if let Some(parent) = stack.last_mut() {
                    parent.push(StepInput::Node(node_idx), &self.level_of);
                }
                continue;
            };

            note_slot_issues(graph, node_idx, slot, &mut self.report);
            let input = match slot.source {
                InputSource::Absent => StepInput::Absent,
                InputSource::Dangling => StepInput::Zero,
                InputSource::Node(src) => {
                    let src = src as usize;
                    if self.visiting[src] {
                        self.report.push(cycle_issue(graph, node_idx, slot));
                        StepInput::Zero
                    } else if self.level_of[src].is_some() {
                        StepInput::Node(src)
                    } else {
                        self.visiting[src] = true;
                        stack.push(PlanFrame::new(src));
                        continue;
                    }
                }
            };
            if let Some(frame) = stack.last_mut() {
                frame.push(input, &self.level_of);
            }
        }
    }
}

/// Build the evaluation plan for `root`, collecting absorbed anomalies.
pub fn plan(graph: &EvalGraph, root: usize) -> (Plan, EvalReport) {
    let node_count = graph.node_count();
    let mut planner = Planner {
        graph,
        level_of: vec![None; node_count],
        visiting: vec![false; node_count],
        steps: Vec::new(),
        report: EvalReport::default(),
    };
    planner.visit(root);

    let depth = planner
        .steps
        .iter()
        .filter_map(|s| planner.level_of[s.node_idx])
        .max()
        .map_or(0, |d| d + 1);
    let mut levels: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (step_idx, step) in planner.steps.iter().enumerate() {
        if let Some(level) = planner.level_of[step.node_idx] {
            levels[level].push(step_idx);
        }
    }

    let plan = Plan {
        steps: planner.steps,
        levels,
        root,
    };
    (plan, planner.report)
}

/// Run a plan level by level, computing each level's nodes in parallel.
pub fn execute(
    graph: &EvalGraph,
    plan: &Plan,
    dims: GridDims,
    seed: i32,
    options: &EvalOptions,
) -> Result<Vec<f32>> {
    let mut slots: Vec<Option<Field>> = vec![None; graph.node_count()];
    let zeros: Vec<f32> = vec![0.0; dims.cell_count()];

    for level in &plan.levels {
        options.cancel.check()?;

        let computed: Vec<(usize, Vec<f32>)> = level
            .par_iter()
            .map(|&step_idx| {
                let step = &plan.steps[step_idx];
                let views: SmallVec<[Option<&[f32]>; 2]> = step
                    .inputs
                    .iter()
                    .map(|input| match *input {
                        StepInput::Absent => None,
                        StepInput::Zero => Some(zeros.as_slice()),
                        StepInput::Node(src) => slots[src].as_ref().map(|f| f.as_slice()),
                    })
                    .collect();
                let op = &graph.operators[step.node_idx];
                let node_id = graph.node_id(step.node_idx);
                let field = apply_operator(op, node_id, &views, dims, seed, &options.cancel)?;
                options.observer.on_node_evaluated(node_id, op.kind());
                Ok((step.node_idx, field))
            })
            .collect::<Result<_>>()?;

        for (node_idx, field) in computed {
            slots[node_idx] = Some(Arc::new(field));
        }
    }

    let root = slots[plan.root].take().map_or(zeros, |field| {
        Arc::try_unwrap(field).unwrap_or_else(|shared| (*shared).clone())
    });
    Ok(root)
}

/// Evaluate the graph's output node on the scheduled path.
///
/// Returns `None` when the graph has no output node.
pub fn evaluate_scheduled(
    graph: &EvalGraph,
    dims: GridDims,
    seed: i32,
    options: &EvalOptions,
) -> Result<Option<(Vec<f32>, EvalReport)>> {
    let Some(root) = graph.output_idx else {
        return Ok(None);
    };

    let (plan, mut report) = plan(graph, root);
    tracing::debug!(
        steps = plan.steps.len(),
        levels = plan.levels.len(),
        "evaluation plan built"
    );
    let values = execute(graph, &plan, dims, seed, options)?;
    report.nodes_evaluated = plan.steps.len();
    Ok(Some((values, report)))
}
