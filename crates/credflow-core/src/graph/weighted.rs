//! Immutable graph plus the weights that define its Markov chain.
//!
//! Nodes and edges are assigned a stable position (ascending by address) at
//! construction. Every per-node and per-edge vector produced downstream,
//! including all cred scores, is aligned with that ordering.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{CredError, CredResult};
use crate::graph::address::{EdgeAddress, NodeAddress};
use crate::graph::json::GraphJson;
use crate::graph::multigraph::{Edge, EdgeFilter, Graph};
use crate::graph::weights::{check_weight, EdgeWeight, EdgeWeightEvaluator};

/// Serialized form of a [`WeightedGraph`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedGraphJson {
    pub graph: GraphJson,
    pub sorted_edge_weights: Vec<EdgeWeight>,
    pub synthetic_loop_weight: f64,
}

#[derive(Clone, Debug)]
pub struct WeightedGraph {
    graph: Graph,
    synthetic_loop_weight: f64,
    node_order: Vec<NodeAddress>,
    node_index: HashMap<NodeAddress, usize>,
    edge_order: Vec<EdgeAddress>,
    edge_index: HashMap<EdgeAddress, usize>,
    edge_src: Vec<usize>,
    edge_dst: Vec<usize>,
    edge_weights: Vec<EdgeWeight>,
    mint_weights: Vec<f64>,
    timestamps: Vec<Option<i64>>,
    total_out: Vec<f64>,
}

impl WeightedGraph {
    /// Wraps `graph`, which must have no dangling edges, with exactly one
    /// weight per edge.
    pub fn new<I>(graph: Graph, weights: I, synthetic_loop_weight: f64) -> CredResult<Self>
    where
        I: IntoIterator<Item = (EdgeAddress, EdgeWeight)>,
    {
        if !synthetic_loop_weight.is_finite() || synthetic_loop_weight <= 0.0 {
            return Err(CredError::InvalidLoopWeight(synthetic_loop_weight));
        }
        if let Some(edge) = graph
            .edges(&EdgeFilter::all())
            .find(|edge| graph.is_dangling(&edge.address))
        {
            return Err(CredError::DanglingEdge(edge.address.clone()));
        }

        let mut supplied: HashMap<EdgeAddress, EdgeWeight> = HashMap::new();
        for (address, weight) in weights {
            if !graph.has_edge(&address) {
                return Err(CredError::OrphanWeight(address));
            }
            check_weight("forward", address.to_string(), weight.forward)?;
            check_weight("backward", address.to_string(), weight.backward)?;
            if supplied.insert(address.clone(), weight).is_some() {
                return Err(CredError::DuplicateWeight(address));
            }
        }

        let mut node_order: Vec<NodeAddress> =
            graph.nodes(None).map(|node| node.address.clone()).collect();
        node_order.sort();
        let node_index: HashMap<NodeAddress, usize> = node_order
            .iter()
            .enumerate()
            .map(|(i, address)| (address.clone(), i))
            .collect();
        let mut mint_weights = Vec::with_capacity(node_order.len());
        let mut timestamps = Vec::with_capacity(node_order.len());
        for address in &node_order {
            let node = graph
                .node(address)
                .ok_or_else(|| CredError::UnknownNode(address.clone()))?;
            check_weight("mint", address.to_string(), node.mint_weight)?;
            mint_weights.push(node.mint_weight);
            timestamps.push(node.timestamp_ms);
        }

        let mut edges: Vec<&Edge> = graph.edges(&EdgeFilter::all()).collect();
        edges.sort_by(|a, b| a.address.cmp(&b.address));
        let mut edge_order = Vec::with_capacity(edges.len());
        let mut edge_src = Vec::with_capacity(edges.len());
        let mut edge_dst = Vec::with_capacity(edges.len());
        let mut edge_weights = Vec::with_capacity(edges.len());
        let mut total_out = vec![synthetic_loop_weight; node_order.len()];
        for edge in edges {
            let weight = supplied
                .get(&edge.address)
                .copied()
                .ok_or_else(|| CredError::MissingWeight(edge.address.clone()))?;
            let src = node_index[&edge.src];
            let dst = node_index[&edge.dst];
            total_out[src] += weight.forward;
            total_out[dst] += weight.backward;
            edge_order.push(edge.address.clone());
            edge_src.push(src);
            edge_dst.push(dst);
            edge_weights.push(weight);
        }
        let edge_index: HashMap<EdgeAddress, usize> = edge_order
            .iter()
            .enumerate()
            .map(|(i, address)| (address.clone(), i))
            .collect();

        debug!(
            nodes = node_order.len(),
            edges = edge_order.len(),
            synthetic_loop_weight,
            "built weighted graph"
        );

        Ok(Self {
            graph,
            synthetic_loop_weight,
            node_order,
            node_index,
            edge_order,
            edge_index,
            edge_src,
            edge_dst,
            edge_weights,
            mint_weights,
            timestamps,
            total_out,
        })
    }

    /// Weights every edge of `graph` with `evaluator`.
    pub fn from_evaluator<F>(graph: Graph, evaluator: F, synthetic_loop_weight: f64) -> CredResult<Self>
    where
        F: Fn(&Edge) -> EdgeWeight,
    {
        let weights: Vec<(EdgeAddress, EdgeWeight)> = graph
            .edges(&EdgeFilter::all())
            .map(|edge| (edge.address.clone(), evaluator(edge)))
            .collect();
        Self::new(graph, weights, synthetic_loop_weight)
    }

    pub fn from_weights(graph: Graph, evaluator: &EdgeWeightEvaluator, synthetic_loop_weight: f64) -> CredResult<Self> {
        Self::from_evaluator(graph, |edge| evaluator.evaluate_edge(edge), synthetic_loop_weight)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn synthetic_loop_weight(&self) -> f64 {
        self.synthetic_loop_weight
    }

    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_order.len()
    }

    pub fn node_order(&self) -> &[NodeAddress] {
        &self.node_order
    }

    pub fn edge_order(&self) -> &[EdgeAddress] {
        &self.edge_order
    }

    pub fn node_index(&self, address: &NodeAddress) -> Option<usize> {
        self.node_index.get(address).copied()
    }

    pub fn edge_index(&self, address: &EdgeAddress) -> Option<usize> {
        self.edge_index.get(address).copied()
    }

    pub fn edge_weight(&self, address: &EdgeAddress) -> Option<EdgeWeight> {
        self.edge_index(address).map(|i| self.edge_weights[i])
    }

    pub fn total_out_weight(&self, address: &NodeAddress) -> CredResult<f64> {
        self.node_index(address)
            .map(|i| self.total_out[i])
            .ok_or_else(|| CredError::UnknownNode(address.clone()))
    }

    /// Transition probabilities out of `address`: the self-loop share first,
    /// then one entry per forward and per backward edge share. Targets may
    /// repeat when several edges lead to the same node.
    pub fn transition_shares(&self, address: &NodeAddress) -> CredResult<Vec<(NodeAddress, f64)>> {
        let total = self.total_out_weight(address)?;
        let mut shares = vec![(address.clone(), self.synthetic_loop_weight / total)];
        for edge in self.graph.out_edges(address)? {
            let weight = self.edge_weights[self.edge_index[&edge.address]];
            shares.push((edge.dst.clone(), weight.forward / total));
        }
        for edge in self.graph.in_edges(address)? {
            let weight = self.edge_weights[self.edge_index[&edge.address]];
            shares.push((edge.src.clone(), weight.backward / total));
        }
        Ok(shares)
    }

    /// Earliest and latest node timestamps, inclusive. `None` when no node
    /// carries a timestamp.
    pub fn time_span(&self) -> Option<(i64, i64)> {
        let mut timestamps = self.timestamps.iter().flatten().copied();
        let first = timestamps.next()?;
        Some(timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
    }

    pub(crate) fn edge_endpoints(&self) -> (&[usize], &[usize]) {
        (&self.edge_src, &self.edge_dst)
    }

    pub(crate) fn edge_weights(&self) -> &[EdgeWeight] {
        &self.edge_weights
    }

    pub(crate) fn total_out_weights(&self) -> &[f64] {
        &self.total_out
    }

    pub(crate) fn mint_weights(&self) -> &[f64] {
        &self.mint_weights
    }

    pub(crate) fn timestamps(&self) -> &[Option<i64>] {
        &self.timestamps
    }

    // -- Serialization -------------------------------------------------------

    pub fn to_json(&self) -> WeightedGraphJson {
        WeightedGraphJson {
            graph: self.graph.to_json(),
            sorted_edge_weights: self.edge_weights.clone(),
            synthetic_loop_weight: self.synthetic_loop_weight,
        }
    }

    pub fn from_json(json: WeightedGraphJson) -> CredResult<Self> {
        let graph = Graph::from_json(json.graph)?;
        let mut addresses: Vec<EdgeAddress> = graph
            .edges(&EdgeFilter::all())
            .map(|edge| edge.address.clone())
            .collect();
        addresses.sort();
        if addresses.len() != json.sorted_edge_weights.len() {
            return Err(CredError::MalformedJson(format!(
                "{} edge weights for {} edges",
                json.sorted_edge_weights.len(),
                addresses.len()
            )));
        }
        let weights = addresses.into_iter().zip(json.sorted_edge_weights);
        Self::new(graph, weights, json.synthetic_loop_weight)
    }

    pub fn to_json_string(&self) -> CredResult<String> {
        Ok(serde_json::to_string(&self.to_json())?)
    }

    pub fn from_json_str(json: &str) -> CredResult<Self> {
        Self::from_json(serde_json::from_str(json)?)
    }

    /// SHA-256 hex digest of the canonical JSON encoding.
    pub fn content_hash(&self) -> CredResult<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json_string()?.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl PartialEq for WeightedGraph {
    fn eq(&self, other: &Self) -> bool {
        self.synthetic_loop_weight == other.synthetic_loop_weight
            && self.graph == other.graph
            && self.edge_order == other.edge_order
            && self.edge_weights == other.edge_weights
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph::multigraph::tests::{edge_address, make_edge, make_node, node_address};
    use crate::graph::multigraph::{EndpointPolicy, Node};

    pub(crate) fn triangle() -> WeightedGraph {
        let mut graph = Graph::new();
        for name in ["a", "b", "c"] {
            graph.add_node(make_node(name).with_mint_weight(1.0)).unwrap();
        }
        graph.add_edge(make_edge("ab", "a", "b")).unwrap();
        graph.add_edge(make_edge("bc", "b", "c")).unwrap();
        graph.add_edge(make_edge("ca", "c", "a")).unwrap();
        graph.add_edge(make_edge("aa", "a", "a")).unwrap();
        let weights = vec![
            (edge_address("ab"), EdgeWeight::new(1.0, 0.5)),
            (edge_address("bc"), EdgeWeight::new(2.0, 0.0)),
            (edge_address("ca"), EdgeWeight::new(0.25, 4.0)),
            (edge_address("aa"), EdgeWeight::new(1.0, 1.0)),
        ];
        WeightedGraph::new(graph, weights, 0.5).unwrap()
    }

    #[test]
    fn total_out_weight_sums_loop_forward_and_backward() {
        let wg = triangle();
        // a: loop + ab.fwd + aa.fwd + ca.bwd + aa.bwd
        assert_eq!(wg.total_out_weight(&node_address("a")).unwrap(), 0.5 + 1.0 + 1.0 + 4.0 + 1.0);
        // b: loop + bc.fwd + ab.bwd
        assert_eq!(wg.total_out_weight(&node_address("b")).unwrap(), 0.5 + 2.0 + 0.5);
        // c: loop + ca.fwd + bc.bwd
        assert_eq!(wg.total_out_weight(&node_address("c")).unwrap(), 0.5 + 0.25 + 0.0);
    }

    #[test]
    fn unknown_node_total_out_weight_fails() {
        let err = triangle().total_out_weight(&node_address("zz")).unwrap_err();
        assert!(matches!(err, CredError::UnknownNode(_)));
    }

    #[test]
    fn transition_shares_sum_to_one() {
        let wg = triangle();
        for address in wg.node_order() {
            let total: f64 = wg
                .transition_shares(address)
                .unwrap()
                .iter()
                .map(|(_, p)| p)
                .sum();
            assert!((total - 1.0).abs() < 1e-12, "{address}: {total}");
        }
    }

    #[test]
    fn time_span_covers_timestamped_nodes() {
        let mut graph = Graph::new();
        graph.add_node(Node::new(node_address("a"), "a", Some(40))).unwrap();
        graph.add_node(Node::new(node_address("b"), "b", None)).unwrap();
        graph.add_node(Node::new(node_address("c"), "c", Some(-3))).unwrap();
        let wg = WeightedGraph::new(graph, Vec::new(), 1.0).unwrap();
        assert_eq!(wg.time_span(), Some((-3, 40)));

        let mut untimed = Graph::new();
        untimed.add_node(Node::new(node_address("a"), "a", None)).unwrap();
        let wg = WeightedGraph::new(untimed, Vec::new(), 1.0).unwrap();
        assert_eq!(wg.time_span(), None);
    }

    #[test]
    fn ordering_is_sorted_by_address() {
        let wg = triangle();
        let names: Vec<&str> = wg.edge_order().iter().map(|a| a.parts()[2].as_str()).collect();
        assert_eq!(names, vec!["aa", "ab", "bc", "ca"]);
        assert_eq!(wg.node_index(&node_address("c")), Some(2));
        assert_eq!(wg.edge_weight(&edge_address("ca")), Some(EdgeWeight::new(0.25, 4.0)));
    }

    #[test]
    fn missing_weight_is_fatal() {
        let mut graph = Graph::new();
        graph.add_node(make_node("a")).unwrap();
        graph.add_node(make_node("b")).unwrap();
        graph.add_edge(make_edge("ab", "a", "b")).unwrap();
        let err = WeightedGraph::new(graph, Vec::new(), 1.0).unwrap_err();
        assert!(matches!(err, CredError::MissingWeight(ref e) if *e == edge_address("ab")));
    }

    #[test]
    fn orphan_and_duplicate_weights_are_fatal() {
        let mut graph = Graph::new();
        graph.add_node(make_node("a")).unwrap();
        graph.add_edge(make_edge("aa", "a", "a")).unwrap();
        let orphan = vec![
            (edge_address("aa"), EdgeWeight::default()),
            (edge_address("nope"), EdgeWeight::default()),
        ];
        let err = WeightedGraph::new(graph.clone(), orphan, 1.0).unwrap_err();
        assert!(matches!(err, CredError::OrphanWeight(_)));

        let duplicate = vec![
            (edge_address("aa"), EdgeWeight::default()),
            (edge_address("aa"), EdgeWeight::new(2.0, 2.0)),
        ];
        let err = WeightedGraph::new(graph, duplicate, 1.0).unwrap_err();
        assert!(matches!(err, CredError::DuplicateWeight(_)));
    }

    #[test]
    fn loop_weight_must_be_positive() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = WeightedGraph::new(Graph::new(), Vec::new(), bad).unwrap_err();
            assert!(matches!(err, CredError::InvalidLoopWeight(_)));
        }
    }

    #[test]
    fn negative_weights_are_fatal() {
        let mut graph = Graph::new();
        graph.add_node(make_node("a")).unwrap();
        graph.add_edge(make_edge("aa", "a", "a")).unwrap();
        let err = WeightedGraph::new(
            graph.clone(),
            vec![(edge_address("aa"), EdgeWeight::new(-1.0, 0.0))],
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, CredError::InvalidWeight { what: "forward", .. }));

        let mut graph = Graph::new();
        graph.add_node(make_node("a").with_mint_weight(-2.0)).unwrap();
        let err = WeightedGraph::new(graph, Vec::new(), 1.0).unwrap_err();
        assert!(matches!(err, CredError::InvalidWeight { what: "mint", .. }));
    }

    #[test]
    fn dangling_edges_are_rejected() {
        let mut graph = Graph::new();
        graph.add_node(make_node("a")).unwrap();
        graph
            .add_edge_with(make_edge("ab", "a", "b"), EndpointPolicy::AllowDangling)
            .unwrap();
        let err = WeightedGraph::from_evaluator(graph.clone(), |_| EdgeWeight::default(), 1.0)
            .unwrap_err();
        assert!(matches!(err, CredError::DanglingEdge(_)));
        assert!(
            WeightedGraph::from_evaluator(graph.without_dangling_edges(), |_| EdgeWeight::default(), 1.0)
                .is_ok()
        );
    }

    #[test]
    fn json_round_trip_and_hash() {
        let wg = triangle();
        let json = wg.to_json_string().unwrap();
        assert!(json.contains("\"sortedEdgeWeights\":[{\"forwardWeight\":1.0,\"backwardWeight\":1.0}"));
        let restored = WeightedGraph::from_json_str(&json).unwrap();
        assert_eq!(restored, wg);
        assert_eq!(restored.to_json_string().unwrap(), json);
        assert_eq!(restored.content_hash().unwrap(), wg.content_hash().unwrap());
        assert_eq!(wg.content_hash().unwrap().len(), 64);

        let mut changed = wg.to_json();
        changed.synthetic_loop_weight = 0.75;
        let changed = WeightedGraph::from_json(changed).unwrap();
        assert_ne!(changed, wg);
        assert_ne!(changed.content_hash().unwrap(), wg.content_hash().unwrap());
    }

    #[test]
    fn json_weight_count_mismatch_is_rejected() {
        let mut json = triangle().to_json();
        json.sorted_edge_weights.pop();
        let err = WeightedGraph::from_json(json).unwrap_err();
        assert!(matches!(err, CredError::MalformedJson(_)));
    }
}
