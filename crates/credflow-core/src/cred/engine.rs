//! Per-interval cred distribution over a weighted graph.
//!
//! The weighted graph defines a row-stochastic Markov chain: from node `n`,
//! mass moves to `n` itself with probability `loop / total(n)`, along each
//! out-edge `e` to `dst(e)` with probability `forward(e) / total(n)`, and
//! against each in-edge `e` to `src(e)` with probability
//! `backward(e) / total(n)`. The synthetic loop makes every `total(n)`
//! positive, so the chain is well defined on any topology.
//!
//! Scores are the fixed point of
//!
//! ```text
//! x = alpha * seed + (1 - alpha) * x * M
//! ```
//!
//! computed by power iteration starting from `x = seed`. Because `M` is
//! row-stochastic, every iterate has the same total mass as the seed.
//!
//! Flows are evaluated at the final iterate and `cred` is defined as their
//! sum, so for every node
//! `cred = seed_flow + synthetic_loop_flow + inbound forward/backward flow`
//! holds whether or not the iteration converged.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CredConfig;
use crate::cred::interval::Interval;
use crate::errors::{CredError, CredResult};
use crate::graph::weighted::WeightedGraph;

/// How the power iteration ended.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Convergence {
    pub iterations: usize,
    /// Relative L1 change of the last step.
    pub delta: f64,
    pub converged: bool,
}

/// Raised, not thrown, when the iteration cap is reached first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceWarning {
    pub interval: Interval,
    pub iterations: usize,
    pub delta: f64,
}

/// Scores for one interval, aligned with the weighted graph's node and edge
/// order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredScores {
    pub interval: Interval,
    pub minted: Vec<f64>,
    pub cred: Vec<f64>,
    pub seed_flow: Vec<f64>,
    pub synthetic_loop_flow: Vec<f64>,
    pub forward_flow: Vec<f64>,
    pub backward_flow: Vec<f64>,
    pub convergence: Convergence,
}

impl CredScores {
    pub fn warning(&self) -> Option<ConvergenceWarning> {
        if self.convergence.converged {
            return None;
        }
        Some(ConvergenceWarning {
            interval: self.interval,
            iterations: self.convergence.iterations,
            delta: self.convergence.delta,
        })
    }

    pub fn total_cred(&self) -> f64 {
        self.cred.iter().sum()
    }

    pub fn total_minted(&self) -> f64 {
        self.minted.iter().sum()
    }
}

/// Transition probabilities precomputed from a weighted graph.
struct Transitions<'a> {
    src: &'a [usize],
    dst: &'a [usize],
    loop_share: Vec<f64>,
    forward_share: Vec<f64>,
    backward_share: Vec<f64>,
}

impl<'a> Transitions<'a> {
    fn new(graph: &'a WeightedGraph) -> Self {
        let (src, dst) = graph.edge_endpoints();
        let total = graph.total_out_weights();
        let loop_weight = graph.synthetic_loop_weight();
        let weights = graph.edge_weights();
        Self {
            src,
            dst,
            loop_share: total.iter().map(|t| loop_weight / t).collect(),
            forward_share: weights
                .iter()
                .zip(src)
                .map(|(w, &s)| w.forward / total[s])
                .collect(),
            backward_share: weights
                .iter()
                .zip(dst)
                .map(|(w, &d)| w.backward / total[d])
                .collect(),
        }
    }

    /// Writes `alpha * seed + (1 - alpha) * x * M` into `next`.
    fn step(&self, alpha: f64, seed: &[f64], x: &[f64], next: &mut [f64]) {
        let carry = 1.0 - alpha;
        for n in 0..x.len() {
            next[n] = alpha * seed[n] + carry * x[n] * self.loop_share[n];
        }
        for e in 0..self.src.len() {
            let (s, d) = (self.src[e], self.dst[e]);
            next[d] += carry * x[s] * self.forward_share[e];
            next[s] += carry * x[d] * self.backward_share[e];
        }
    }
}

fn check_mint(graph: &WeightedGraph, mint: &[f64]) -> CredResult<f64> {
    if mint.len() != graph.node_count() {
        return Err(CredError::MintLength {
            expected: graph.node_count(),
            actual: mint.len(),
        });
    }
    let mut total = 0.0;
    for (i, &value) in mint.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(CredError::InvalidMint {
                address: graph.node_order()[i].clone(),
                value,
            });
        }
        total += value;
    }
    Ok(total)
}

/// An interval must overlap the span of node timestamps. Graphs without any
/// timestamp accept every interval.
fn check_domain(graph: &WeightedGraph, interval: &Interval) -> CredResult<()> {
    let Some((first_ms, last_ms)) = graph.time_span() else {
        return Ok(());
    };
    if interval.end_time_ms <= first_ms || interval.start_time_ms > last_ms {
        return Err(CredError::IntervalOutOfDomain {
            start_ms: interval.start_time_ms,
            end_ms: interval.end_time_ms,
            first_ms,
            last_ms,
        });
    }
    Ok(())
}

/// Computes cred for one interval given each node's minted amount.
pub fn compute_cred(
    graph: &WeightedGraph,
    interval: Interval,
    mint: &[f64],
    config: &CredConfig,
) -> CredResult<CredScores> {
    config.validate()?;
    interval.validate()?;
    check_domain(graph, &interval)?;
    let total_mint = check_mint(graph, mint)?;
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();

    if total_mint == 0.0 {
        return Ok(CredScores {
            interval,
            minted: mint.to_vec(),
            cred: vec![0.0; node_count],
            seed_flow: vec![0.0; node_count],
            synthetic_loop_flow: vec![0.0; node_count],
            forward_flow: vec![0.0; edge_count],
            backward_flow: vec![0.0; edge_count],
            convergence: Convergence {
                iterations: 0,
                delta: 0.0,
                converged: true,
            },
        });
    }

    let transitions = Transitions::new(graph);
    let alpha = config.alpha;
    let mut x = mint.to_vec();
    let mut next = vec![0.0; node_count];
    let mut iterations = 0;
    let mut delta = f64::INFINITY;
    while iterations < config.max_iterations {
        transitions.step(alpha, mint, &x, &mut next);
        iterations += 1;
        delta = x
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            / total_mint;
        std::mem::swap(&mut x, &mut next);
        if delta < config.convergence_threshold {
            break;
        }
    }
    let converged = delta < config.convergence_threshold;
    if !converged {
        warn!(
            start_ms = interval.start_time_ms,
            end_ms = interval.end_time_ms,
            iterations,
            delta,
            "cred did not converge within the iteration cap"
        );
    }

    let carry = 1.0 - alpha;
    let seed_flow: Vec<f64> = mint.iter().map(|m| alpha * m).collect();
    let synthetic_loop_flow: Vec<f64> = x
        .iter()
        .zip(&transitions.loop_share)
        .map(|(value, share)| carry * value * share)
        .collect();
    let mut forward_flow = Vec::with_capacity(edge_count);
    let mut backward_flow = Vec::with_capacity(edge_count);
    let mut cred: Vec<f64> = seed_flow
        .iter()
        .zip(&synthetic_loop_flow)
        .map(|(seed, retained)| seed + retained)
        .collect();
    for e in 0..edge_count {
        let (s, d) = (transitions.src[e], transitions.dst[e]);
        let forward = carry * x[s] * transitions.forward_share[e];
        let backward = carry * x[d] * transitions.backward_share[e];
        cred[d] += forward;
        cred[s] += backward;
        forward_flow.push(forward);
        backward_flow.push(backward);
    }

    debug!(
        start_ms = interval.start_time_ms,
        iterations,
        delta,
        total_mint,
        "computed interval cred"
    );

    Ok(CredScores {
        interval,
        minted: mint.to_vec(),
        cred,
        seed_flow,
        synthetic_loop_flow,
        forward_flow,
        backward_flow,
        convergence: Convergence {
            iterations,
            delta,
            converged,
        },
    })
}
