//! Python bindings over the JSON contracts.

use pyo3::prelude::*;

use crate::config::{clamp_iterations, clamp_workers, CredConfig};
use crate::cred::interval::{partition, Interval};
use crate::cred::timeline::compute_timeline_cred;
use crate::errors::{CredError, CredResult};
use crate::graph::weighted::WeightedGraph;

/// Scores a serialized weighted graph over `(start_ms, end_ms)` intervals and
/// returns the timeline as JSON. Unset parameters fall back to the
/// environment and then to the defaults.
#[pyfunction]
#[pyo3(name = "compute_timeline_cred")]
#[pyo3(signature = (
    weighted_graph_json,
    intervals,
    alpha=None,
    max_iterations=None,
    convergence_threshold=None,
    workers=None,
))]
pub fn py_compute_timeline_cred(
    py: Python<'_>,
    weighted_graph_json: &str,
    intervals: Vec<(i64, i64)>,
    alpha: Option<f64>,
    max_iterations: Option<i64>,
    convergence_threshold: Option<f64>,
    workers: Option<i64>,
) -> PyResult<String> {
    let graph = WeightedGraph::from_json_str(weighted_graph_json)?;
    let intervals = intervals
        .into_iter()
        .map(|(start, end)| Interval::new(start, end))
        .collect::<CredResult<Vec<Interval>>>()?;

    let mut config = CredConfig::from_env();
    if let Some(alpha) = alpha {
        config.alpha = alpha;
    }
    if let Some(iterations) = max_iterations {
        config.max_iterations = clamp_iterations(iterations);
    }
    if let Some(threshold) = convergence_threshold {
        config.convergence_threshold = threshold;
    }
    if let Some(workers) = workers {
        config.workers = clamp_workers(workers);
    }

    let timeline = py.allow_threads(|| compute_timeline_cred(&graph, &intervals, &config, None))?;
    Ok(serde_json::to_string(&timeline).map_err(CredError::from)?)
}

#[pyfunction]
pub fn weighted_graph_content_hash(weighted_graph_json: &str) -> PyResult<String> {
    let graph = WeightedGraph::from_json_str(weighted_graph_json)?;
    Ok(graph.content_hash()?)
}

#[pyfunction]
pub fn partition_intervals(start_ms: i64, end_ms: i64, width_ms: i64) -> PyResult<Vec<(i64, i64)>> {
    let intervals = partition(start_ms, end_ms, width_ms)?;
    Ok(intervals
        .into_iter()
        .map(|i| (i.start_time_ms, i.end_time_ms))
        .collect())
}
