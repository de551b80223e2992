//! Error types for the credflow core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

use crate::graph::address::{EdgeAddress, NodeAddress};

/// Coarse classification of a [`CredError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A graph or weighted graph could not be built. Never recovered.
    Construction,
    /// The interval sequence is malformed.
    InputOrdering,
    /// A per-call input was rejected before any work started.
    Input,
}

/// Top-level error enum for the credflow core library.
#[derive(Debug, thiserror::Error)]
pub enum CredError {
    #[error("invalid address part {part:?}: parts may not contain NUL")]
    InvalidAddressPart { part: String },

    #[error("distinct nodes with address {0}")]
    NodeConflict(NodeAddress),

    #[error("distinct edges with address {0}")]
    EdgeConflict(EdgeAddress),

    #[error("edge {edge} has missing {role} {endpoint}")]
    MissingEndpoint {
        edge: EdgeAddress,
        role: &'static str,
        endpoint: NodeAddress,
    },

    #[error("edge {0} is dangling and cannot be weighted")]
    DanglingEdge(EdgeAddress),

    #[error("no weight supplied for edge {0}")]
    MissingWeight(EdgeAddress),

    #[error("weight supplied for nonexistent edge {0}")]
    OrphanWeight(EdgeAddress),

    #[error("more than one weight supplied for edge {0}")]
    DuplicateWeight(EdgeAddress),

    #[error("invalid {what} weight {value} for {address}")]
    InvalidWeight {
        what: &'static str,
        address: String,
        value: f64,
    },

    #[error("synthetic loop weight must be finite and positive, got {0}")]
    InvalidLoopWeight(f64),

    #[error("unknown node {0}")]
    UnknownNode(NodeAddress),

    #[error("invalid interval [{start_ms}, {end_ms})")]
    InvalidInterval { start_ms: i64, end_ms: i64 },

    #[error("interval [{start_ms}, {end_ms}) lies outside the graph's timestamps [{first_ms}, {last_ms}]")]
    IntervalOutOfDomain {
        start_ms: i64,
        end_ms: i64,
        first_ms: i64,
        last_ms: i64,
    },

    #[error("interval {index} starts at {start_ms} before the previous interval ends at {previous_end_ms}")]
    InputOrdering {
        index: usize,
        start_ms: i64,
        previous_end_ms: i64,
    },

    #[error("mint vector has {actual} entries but the graph has {expected} nodes")]
    MintLength { expected: usize, actual: usize },

    #[error("invalid mint amount {value} for node {address}")]
    InvalidMint { address: NodeAddress, value: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cancelled after {completed} of {total} intervals")]
    Cancelled { completed: usize, total: usize },

    #[error("expected {expected} but found {found}")]
    Compat { expected: String, found: String },

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CredError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CredError::InputOrdering { .. } | CredError::InvalidInterval { .. } => {
                ErrorClass::InputOrdering
            }
            CredError::UnknownNode(_)
            | CredError::IntervalOutOfDomain { .. }
            | CredError::MintLength { .. }
            | CredError::InvalidMint { .. }
            | CredError::InvalidConfig(_)
            | CredError::Cancelled { .. } => ErrorClass::Input,
            _ => ErrorClass::Construction,
        }
    }
}

#[cfg(feature = "python")]
impl From<CredError> for PyErr {
    fn from(err: CredError) -> PyErr {
        match err.class() {
            ErrorClass::Construction | ErrorClass::InputOrdering => {
                PyValueError::new_err(err.to_string())
            }
            ErrorClass::Input => match err {
                CredError::Cancelled { .. } => PyRuntimeError::new_err(err.to_string()),
                _ => PyValueError::new_err(err.to_string()),
            },
        }
    }
}

pub type CredResult<T> = Result<T, CredError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_address() {
        let address = NodeAddress::from_parts(["test", "a"]).unwrap();
        let err = CredError::NodeConflict(address);
        assert_eq!(
            err.to_string(),
            "distinct nodes with address NodeAddress[\"test\",\"a\"]"
        );
        assert_eq!(err.class(), ErrorClass::Construction);
    }

    #[test]
    fn ordering_errors_are_classified() {
        let err = CredError::InputOrdering {
            index: 1,
            start_ms: 5,
            previous_end_ms: 10,
        };
        assert_eq!(err.class(), ErrorClass::InputOrdering);
        let err = CredError::MintLength {
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.class(), ErrorClass::Input);
    }
}
