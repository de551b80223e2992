//! Prefix-keyed node and edge weights.
//!
//! Plugins declare node and edge types, each identified by an address
//! prefix and carrying a default weight. Users may override the weight of
//! any prefix. The weight of a concrete address is the product of the weights
//! of every registered prefix of that address, or 1 when none is registered.
//!
//! Evaluators are resolved once into a sorted map keyed by address parts;
//! evaluating an address walks its own prefixes, so the cost depends on the
//! address depth rather than on the number of registered types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{CredError, CredResult};
use crate::graph::address::{EdgeAddress, NodeAddress};
use crate::graph::multigraph::{Edge, Node};

/// Forward and backward weight of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeWeight {
    #[serde(rename = "forwardWeight")]
    pub forward: f64,
    #[serde(rename = "backwardWeight")]
    pub backward: f64,
}

impl EdgeWeight {
    pub fn new(forward: f64, backward: f64) -> Self {
        Self { forward, backward }
    }

    fn scaled_by(self, other: EdgeWeight) -> EdgeWeight {
        EdgeWeight {
            forward: self.forward * other.forward,
            backward: self.backward * other.backward,
        }
    }
}

impl Default for EdgeWeight {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// A node type declared by a plugin.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeType {
    pub name: String,
    pub prefix: NodeAddress,
    pub default_weight: f64,
    pub description: String,
}

/// An edge type declared by a plugin, e.g. "authors" / "is authored by".
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeType {
    pub forward_name: String,
    pub backward_name: String,
    pub prefix: EdgeAddress,
    pub default_weight: EdgeWeight,
    pub description: String,
}

/// Rejects weights that are negative or not finite.
pub(crate) fn check_weight(what: &'static str, address: String, value: f64) -> CredResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CredError::InvalidWeight {
            what,
            address,
            value,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Weights {
    node_weights: BTreeMap<NodeAddress, f64>,
    edge_weights: BTreeMap<EdgeAddress, EdgeWeight>,
}

impl Weights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default weights of the given types. A later type with the same prefix
    /// replaces an earlier one.
    pub fn from_types(node_types: &[NodeType], edge_types: &[EdgeType]) -> CredResult<Self> {
        let mut weights = Self::new();
        for node_type in node_types {
            weights.set_node_weight(node_type.prefix.clone(), node_type.default_weight)?;
        }
        for edge_type in edge_types {
            weights.set_edge_weight(edge_type.prefix.clone(), edge_type.default_weight)?;
        }
        Ok(weights)
    }

    pub fn set_node_weight(&mut self, prefix: NodeAddress, weight: f64) -> CredResult<&mut Self> {
        check_weight("node", prefix.to_string(), weight)?;
        self.node_weights.insert(prefix, weight);
        Ok(self)
    }

    pub fn set_edge_weight(&mut self, prefix: EdgeAddress, weight: EdgeWeight) -> CredResult<&mut Self> {
        check_weight("forward", prefix.to_string(), weight.forward)?;
        check_weight("backward", prefix.to_string(), weight.backward)?;
        self.edge_weights.insert(prefix, weight);
        Ok(self)
    }

    pub fn node_weight(&self, prefix: &NodeAddress) -> Option<f64> {
        self.node_weights.get(prefix).copied()
    }

    pub fn edge_weight(&self, prefix: &EdgeAddress) -> Option<EdgeWeight> {
        self.edge_weights.get(prefix).copied()
    }

    /// These weights with every prefix set in `overrides` replaced.
    pub fn overridden_by(&self, overrides: &Weights) -> Weights {
        let mut result = self.clone();
        result
            .node_weights
            .extend(overrides.node_weights.iter().map(|(k, v)| (k.clone(), *v)));
        result
            .edge_weights
            .extend(overrides.edge_weights.iter().map(|(k, v)| (k.clone(), *v)));
        result
    }

    pub fn node_evaluator(&self) -> NodeWeightEvaluator {
        NodeWeightEvaluator {
            rules: self
                .node_weights
                .iter()
                .map(|(prefix, weight)| (prefix.to_parts(), *weight))
                .collect(),
        }
    }

    pub fn edge_evaluator(&self) -> EdgeWeightEvaluator {
        EdgeWeightEvaluator {
            rules: self
                .edge_weights
                .iter()
                .map(|(prefix, weight)| (prefix.to_parts(), *weight))
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeWeightEvaluator {
    rules: BTreeMap<Vec<String>, f64>,
}

impl NodeWeightEvaluator {
    pub fn evaluate(&self, address: &NodeAddress) -> f64 {
        let parts = address.parts();
        (0..=parts.len())
            .filter_map(|len| self.rules.get(&parts[..len]))
            .product()
    }

    pub fn evaluate_node(&self, node: &Node) -> f64 {
        self.evaluate(&node.address)
    }
}

#[derive(Clone, Debug)]
pub struct EdgeWeightEvaluator {
    rules: BTreeMap<Vec<String>, EdgeWeight>,
}

impl EdgeWeightEvaluator {
    pub fn evaluate(&self, address: &EdgeAddress) -> EdgeWeight {
        let parts = address.parts();
        (0..=parts.len())
            .filter_map(|len| self.rules.get(&parts[..len]))
            .fold(EdgeWeight::default(), |acc, weight| acc.scaled_by(*weight))
    }

    pub fn evaluate_edge(&self, edge: &Edge) -> EdgeWeight {
        self.evaluate(&edge.address)
    }
}
