//! Cred over an ordered sequence of intervals.
//!
//! Each interval is scored independently from the nodes minted inside it.
//! Intervals are distributed over a Rayon pool and collected by index, so
//! results do not depend on completion order.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CredConfig;
use crate::cred::engine::{compute_cred, ConvergenceWarning, CredScores};
use crate::cred::interval::{mint_vector, validate_intervals, Interval};
use crate::errors::{CredError, CredResult};
use crate::graph::address::NodeAddress;
use crate::graph::weighted::WeightedGraph;

/// Cooperative cancellation flag, checked before each interval starts.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-interval scores, one entry per input interval and in the same order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineCredScores {
    pub scores: Vec<CredScores>,
}

/// Sums over every interval of a timeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredTotals {
    pub minted: Vec<f64>,
    pub cred: Vec<f64>,
    pub seed_flow: Vec<f64>,
    pub synthetic_loop_flow: Vec<f64>,
    pub forward_flow: Vec<f64>,
    pub backward_flow: Vec<f64>,
}

fn add_into(total: &mut [f64], values: &[f64]) {
    for (t, v) in total.iter_mut().zip(values) {
        *t += v;
    }
}

impl TimelineCredScores {
    pub fn intervals(&self) -> Vec<Interval> {
        self.scores.iter().map(|s| s.interval).collect()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Cumulative sums. The per-interval scores remain the authoritative
    /// result; totals are a convenience view.
    pub fn totals(&self, graph: &WeightedGraph) -> CredTotals {
        let nodes = graph.node_count();
        let edges = graph.edge_count();
        let mut totals = CredTotals {
            minted: vec![0.0; nodes],
            cred: vec![0.0; nodes],
            seed_flow: vec![0.0; nodes],
            synthetic_loop_flow: vec![0.0; nodes],
            forward_flow: vec![0.0; edges],
            backward_flow: vec![0.0; edges],
        };
        for scores in &self.scores {
            add_into(&mut totals.minted, &scores.minted);
            add_into(&mut totals.cred, &scores.cred);
            add_into(&mut totals.seed_flow, &scores.seed_flow);
            add_into(&mut totals.synthetic_loop_flow, &scores.synthetic_loop_flow);
            add_into(&mut totals.forward_flow, &scores.forward_flow);
            add_into(&mut totals.backward_flow, &scores.backward_flow);
        }
        totals
    }

    pub fn convergence_warnings(&self) -> Vec<ConvergenceWarning> {
        self.scores.iter().filter_map(CredScores::warning).collect()
    }

    /// Nodes under `prefix` ranked by total cred, highest first. Ties are
    /// broken by address.
    pub fn cred_sorted_nodes<'a>(
        &self,
        graph: &'a WeightedGraph,
        prefix: Option<&NodeAddress>,
    ) -> Vec<(&'a NodeAddress, f64)> {
        let totals = self.totals(graph);
        let mut ranked: Vec<(&NodeAddress, f64)> = graph
            .node_order()
            .iter()
            .zip(totals.cred)
            .filter(|(address, _)| prefix.map_or(true, |p| address.has_prefix(p)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        ranked
    }
}

fn score_interval(
    graph: &WeightedGraph,
    interval: &Interval,
    total: usize,
    config: &CredConfig,
    cancel: Option<&CancellationToken>,
    finished: &AtomicUsize,
) -> CredResult<CredScores> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return Err(CredError::Cancelled {
            completed: finished.load(Ordering::SeqCst),
            total,
        });
    }
    let mint = mint_vector(graph, interval);
    let scores = compute_cred(graph, *interval, &mint, config)?;
    finished.fetch_add(1, Ordering::SeqCst);
    Ok(scores)
}

/// Scores every interval. `intervals` must be strictly ascending and
/// non-overlapping.
pub fn compute_timeline_cred(
    graph: &WeightedGraph,
    intervals: &[Interval],
    config: &CredConfig,
    cancel: Option<&CancellationToken>,
) -> CredResult<TimelineCredScores> {
    config.validate()?;
    validate_intervals(intervals)?;
    let started = Instant::now();
    let total = intervals.len();
    let finished = AtomicUsize::new(0);

    let scores: Vec<CredScores> = if config.workers <= 1 || total <= 1 {
        intervals
            .iter()
            .map(|interval| score_interval(graph, interval, total, config, cancel, &finished))
            .collect::<CredResult<Vec<CredScores>>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                intervals
                    .par_iter()
                    .map(|interval| score_interval(graph, interval, total, config, cancel, &finished))
                    .collect::<CredResult<Vec<CredScores>>>()
            })?,
            Err(e) => {
                warn!("falling back to sequential scoring: {e}");
                intervals
                    .iter()
                    .map(|interval| score_interval(graph, interval, total, config, cancel, &finished))
                    .collect::<CredResult<Vec<CredScores>>>()?
            }
        }
    };

    let timeline = TimelineCredScores { scores };
    let warnings = timeline.convergence_warnings().len();
    info!(
        intervals = total,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        warnings,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "computed timeline cred"
    );
    Ok(timeline)
}
