//! credflow core library - graph model and cred distribution engine.
//!
//! This crate provides the addressable multigraph, the weighted graph that
//! defines a Markov chain over it, and the time-sliced engine that scores
//! every node per interval and decomposes each score into seed, retained and
//! per-edge flow. With the `python` feature it is also compiled as a Python
//! extension module (`_credflow_core`).

pub mod config;
pub mod cred;
pub mod errors;
pub mod graph;

#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

// ---------------------------------------------------------------------------
// Top-level Python module: _credflow_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pymodule]
fn _credflow_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // -- Config defaults and guards -----------------------------------------
    m.add("DEFAULT_ALPHA", config::DEFAULT_ALPHA)?;
    m.add("DEFAULT_MAX_ITERATIONS", config::DEFAULT_MAX_ITERATIONS)?;
    m.add(
        "DEFAULT_CONVERGENCE_THRESHOLD",
        config::DEFAULT_CONVERGENCE_THRESHOLD,
    )?;
    m.add("MAX_ITERATIONS_CAP", config::MAX_ITERATIONS_CAP)?;
    m.add("MAX_WORKERS", config::MAX_WORKERS)?;
    m.add("MAX_INTERVALS", config::MAX_INTERVALS)?;
    m.add("WEEK_MS", cred::interval::WEEK_MS)?;
    m.add("GRAPH_JSON_VERSION", graph::json::GRAPH_JSON_VERSION)?;

    // -- Cred ---------------------------------------------------------------
    m.add_function(wrap_pyfunction!(python::py_compute_timeline_cred, m)?)?;
    m.add_function(wrap_pyfunction!(python::partition_intervals, m)?)?;

    // -- Weighted graph -----------------------------------------------------
    m.add_function(wrap_pyfunction!(python::weighted_graph_content_hash, m)?)?;

    Ok(())
}
