//! Addressable directed multigraph with maintained adjacency indices.
//!
//! Nodes and edges are keyed by address. Edges whose endpoints are not both
//! present are *dangling*: they are stored (so that merges and JSON round-trips
//! preserve them) but kept out of the adjacency index until both endpoints
//! exist, so `out_edges`/`in_edges` never yield a transition to a missing node.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{CredError, CredResult};
use crate::graph::address::{EdgeAddress, NodeAddress};

/// A graph node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub address: NodeAddress,
    /// Creation time. A node without a timestamp never mints cred.
    pub timestamp_ms: Option<i64>,
    pub description: String,
    /// Cred minted when the node's timestamp falls in the scored interval.
    pub mint_weight: f64,
}

impl Node {
    pub fn new(address: NodeAddress, description: impl Into<String>, timestamp_ms: Option<i64>) -> Self {
        Self {
            address,
            timestamp_ms,
            description: description.into(),
            mint_weight: 0.0,
        }
    }

    pub fn with_mint_weight(mut self, mint_weight: f64) -> Self {
        self.mint_weight = mint_weight;
        self
    }
}

/// A directed graph edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub address: EdgeAddress,
    pub src: NodeAddress,
    pub dst: NodeAddress,
    pub timestamp_ms: i64,
}

impl Edge {
    pub fn new(address: EdgeAddress, src: NodeAddress, dst: NodeAddress, timestamp_ms: i64) -> Self {
        Self {
            address,
            src,
            dst,
            timestamp_ms,
        }
    }
}

/// What `add_edge_with` does when an endpoint is absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointPolicy {
    /// Reject the edge with [`CredError::MissingEndpoint`].
    Strict,
    /// Store the edge as dangling.
    AllowDangling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Any,
}

/// Filter for [`Graph::edges`]. The default matches every non-dangling edge.
#[derive(Clone, Debug, Default)]
pub struct EdgeFilter {
    pub address_prefix: EdgeAddress,
    pub src_prefix: NodeAddress,
    pub dst_prefix: NodeAddress,
    pub show_dangling: bool,
}

impl EdgeFilter {
    /// Every edge, dangling or not.
    pub fn all() -> Self {
        Self {
            show_dangling: true,
            ..Self::default()
        }
    }

    pub fn with_prefix(address_prefix: EdgeAddress) -> Self {
        Self {
            address_prefix,
            ..Self::default()
        }
    }
}

/// A node adjacent to a queried node, together with the connecting edge.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor<'a> {
    pub node: &'a Node,
    pub edge: &'a Edge,
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: IndexMap<NodeAddress, Node>,
    edges: IndexMap<EdgeAddress, Edge>,
    out_index: IndexMap<NodeAddress, Vec<EdgeAddress>>,
    in_index: IndexMap<NodeAddress, Vec<EdgeAddress>>,
    // Dangling edges, listed under every endpoint that is currently missing.
    pending: HashMap<NodeAddress, Vec<EdgeAddress>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Mutation ------------------------------------------------------------

    pub fn add_node(&mut self, node: Node) -> CredResult<&mut Self> {
        if let Some(existing) = self.nodes.get(&node.address) {
            if *existing == node {
                return Ok(self);
            }
            return Err(CredError::NodeConflict(node.address));
        }
        let address = node.address.clone();
        self.nodes.insert(address.clone(), node);
        self.out_index.insert(address.clone(), Vec::new());
        self.in_index.insert(address.clone(), Vec::new());
        if let Some(waiting) = self.pending.remove(&address) {
            for edge_address in waiting {
                self.attach_if_resolved(&edge_address);
            }
        }
        Ok(self)
    }

    /// Removes a node. Its incident edges stay in the graph as dangling edges.
    pub fn remove_node(&mut self, address: &NodeAddress) -> Option<Node> {
        let node = self.nodes.shift_remove(address)?;
        let outgoing = self.out_index.shift_remove(address).unwrap_or_default();
        let incoming = self.in_index.shift_remove(address).unwrap_or_default();

        let mut detached = Vec::with_capacity(outgoing.len() + incoming.len());
        for edge_address in outgoing {
            let dst = self.edges[&edge_address].dst.clone();
            if dst != *address {
                if let Some(list) = self.in_index.get_mut(&dst) {
                    list.retain(|e| *e != edge_address);
                }
            }
            detached.push(edge_address);
        }
        for edge_address in incoming {
            let src = self.edges[&edge_address].src.clone();
            // Self-loops were already detached with the outgoing list.
            if src == *address {
                continue;
            }
            if let Some(list) = self.out_index.get_mut(&src) {
                list.retain(|e| *e != edge_address);
            }
            detached.push(edge_address);
        }
        // Edges already dangling on their other endpoint now wait on this one too.
        for waiting in self.pending.values() {
            for edge_address in waiting {
                let edge = &self.edges[edge_address];
                if edge.src == *address || edge.dst == *address {
                    detached.push(edge_address.clone());
                }
            }
        }
        if !detached.is_empty() {
            self.pending.entry(address.clone()).or_default().extend(detached);
        }
        Some(node)
    }

    /// Adds an edge whose endpoints must both exist.
    pub fn add_edge(&mut self, edge: Edge) -> CredResult<&mut Self> {
        self.add_edge_with(edge, EndpointPolicy::Strict)
    }

    pub fn add_edge_with(&mut self, edge: Edge, policy: EndpointPolicy) -> CredResult<&mut Self> {
        if let Some(existing) = self.edges.get(&edge.address) {
            if *existing == edge {
                return Ok(self);
            }
            return Err(CredError::EdgeConflict(edge.address));
        }
        let src_present = self.nodes.contains_key(&edge.src);
        let dst_present = self.nodes.contains_key(&edge.dst);
        if policy == EndpointPolicy::Strict {
            if !src_present {
                return Err(CredError::MissingEndpoint {
                    edge: edge.address,
                    role: "src",
                    endpoint: edge.src,
                });
            }
            if !dst_present {
                return Err(CredError::MissingEndpoint {
                    edge: edge.address,
                    role: "dst",
                    endpoint: edge.dst,
                });
            }
        }

        let address = edge.address.clone();
        if src_present && dst_present {
            self.link(&edge.src, &edge.dst, &address);
        } else {
            if !src_present {
                self.pending.entry(edge.src.clone()).or_default().push(address.clone());
            }
            if !dst_present && edge.dst != edge.src {
                self.pending.entry(edge.dst.clone()).or_default().push(address.clone());
            }
        }
        self.edges.insert(address, edge);
        Ok(self)
    }

    pub fn remove_edge(&mut self, address: &EdgeAddress) -> Option<Edge> {
        let edge = self.edges.shift_remove(address)?;
        let src_present = self.nodes.contains_key(&edge.src);
        let dst_present = self.nodes.contains_key(&edge.dst);
        if src_present && dst_present {
            if let Some(list) = self.out_index.get_mut(&edge.src) {
                list.retain(|e| e != address);
            }
            if let Some(list) = self.in_index.get_mut(&edge.dst) {
                list.retain(|e| e != address);
            }
        } else {
            for endpoint in [&edge.src, &edge.dst] {
                if self.nodes.contains_key(endpoint) {
                    continue;
                }
                if let Some(list) = self.pending.get_mut(endpoint) {
                    list.retain(|e| e != address);
                    if list.is_empty() {
                        self.pending.remove(endpoint);
                    }
                }
            }
        }
        Some(edge)
    }

    fn link(&mut self, src: &NodeAddress, dst: &NodeAddress, address: &EdgeAddress) {
        if let Some(list) = self.out_index.get_mut(src) {
            list.push(address.clone());
        }
        if let Some(list) = self.in_index.get_mut(dst) {
            list.push(address.clone());
        }
    }

    fn attach_if_resolved(&mut self, address: &EdgeAddress) {
        let Some(edge) = self.edges.get(address) else {
            return;
        };
        if self.nodes.contains_key(&edge.src) && self.nodes.contains_key(&edge.dst) {
            let (src, dst) = (edge.src.clone(), edge.dst.clone());
            self.link(&src, &dst, address);
        }
    }

    // -- Queries -------------------------------------------------------------

    pub fn has_node(&self, address: &NodeAddress) -> bool {
        self.nodes.contains_key(address)
    }

    pub fn node(&self, address: &NodeAddress) -> Option<&Node> {
        self.nodes.get(address)
    }

    pub fn has_edge(&self, address: &EdgeAddress) -> bool {
        self.edges.contains_key(address)
    }

    pub fn edge(&self, address: &EdgeAddress) -> Option<&Edge> {
        self.edges.get(address)
    }

    /// True when the edge exists and at least one endpoint is absent.
    pub fn is_dangling(&self, address: &EdgeAddress) -> bool {
        self.edges
            .get(address)
            .is_some_and(|edge| !self.is_resolved(edge))
    }

    fn is_resolved(&self, edge: &Edge) -> bool {
        self.nodes.contains_key(&edge.src) && self.nodes.contains_key(&edge.dst)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes in insertion order, optionally restricted to an address prefix.
    pub fn nodes<'a>(&'a self, prefix: Option<&NodeAddress>) -> impl Iterator<Item = &'a Node> + 'a {
        let prefix = prefix.cloned().unwrap_or_default();
        self.nodes
            .values()
            .filter(move |node| node.address.has_prefix(&prefix))
    }

    /// Edges in insertion order matching `filter`.
    pub fn edges<'a>(&'a self, filter: &EdgeFilter) -> impl Iterator<Item = &'a Edge> + 'a {
        let filter = filter.clone();
        self.edges.values().filter(move |edge| {
            edge.address.has_prefix(&filter.address_prefix)
                && edge.src.has_prefix(&filter.src_prefix)
                && edge.dst.has_prefix(&filter.dst_prefix)
                && (filter.show_dangling || self.is_resolved(edge))
        })
    }

    pub fn out_edges<'a>(&'a self, node: &NodeAddress) -> CredResult<impl Iterator<Item = &'a Edge> + 'a> {
        let list = self
            .out_index
            .get(node)
            .ok_or_else(|| CredError::UnknownNode(node.clone()))?;
        Ok(list.iter().map(move |address| &self.edges[address]))
    }

    pub fn in_edges<'a>(&'a self, node: &NodeAddress) -> CredResult<impl Iterator<Item = &'a Edge> + 'a> {
        let list = self
            .in_index
            .get(node)
            .ok_or_else(|| CredError::UnknownNode(node.clone()))?;
        Ok(list.iter().map(move |address| &self.edges[address]))
    }

    /// Nodes adjacent to `node` in the given direction. A self-loop is
    /// reported once even for [`Direction::Any`].
    pub fn neighbors(&self, node: &NodeAddress, direction: Direction) -> CredResult<Vec<Neighbor<'_>>> {
        let mut result = Vec::new();
        if matches!(direction, Direction::Out | Direction::Any) {
            for edge in self.out_edges(node)? {
                result.push(Neighbor {
                    node: &self.nodes[&edge.dst],
                    edge,
                });
            }
        }
        if matches!(direction, Direction::In | Direction::Any) {
            for edge in self.in_edges(node)? {
                if direction == Direction::Any && edge.src == edge.dst {
                    continue;
                }
                result.push(Neighbor {
                    node: &self.nodes[&edge.src],
                    edge,
                });
            }
        }
        Ok(result)
    }

    // -- Derived graphs ------------------------------------------------------

    /// Combines two graphs. Addresses present in both are combined by the
    /// resolvers, which must return a value at the same address.
    pub fn merge<NF, EF>(g1: &Graph, g2: &Graph, mut node_resolver: NF, mut edge_resolver: EF) -> CredResult<Graph>
    where
        NF: FnMut(&Node, &Node) -> CredResult<Node>,
        EF: FnMut(&Edge, &Edge) -> CredResult<Edge>,
    {
        let mut result = Graph::new();
        for node in g1.nodes.values() {
            let merged = match g2.nodes.get(&node.address) {
                Some(other) => {
                    let merged = node_resolver(node, other)?;
                    if merged.address != node.address {
                        return Err(CredError::NodeConflict(node.address.clone()));
                    }
                    merged
                }
                None => node.clone(),
            };
            result.add_node(merged)?;
        }
        for node in g2.nodes.values() {
            if !g1.nodes.contains_key(&node.address) {
                result.add_node(node.clone())?;
            }
        }
        for edge in g1.edges.values() {
            let merged = match g2.edges.get(&edge.address) {
                Some(other) => {
                    let merged = edge_resolver(edge, other)?;
                    if merged.address != edge.address {
                        return Err(CredError::EdgeConflict(edge.address.clone()));
                    }
                    merged
                }
                None => edge.clone(),
            };
            result.add_edge_with(merged, EndpointPolicy::AllowDangling)?;
        }
        for edge in g2.edges.values() {
            if !g1.edges.contains_key(&edge.address) {
                result.add_edge_with(edge.clone(), EndpointPolicy::AllowDangling)?;
            }
        }
        Ok(result)
    }

    /// Merge that only tolerates structurally identical shared content.
    pub fn merge_conservative(g1: &Graph, g2: &Graph) -> CredResult<Graph> {
        Self::merge_all_conservative([g1, g2])
    }

    pub fn merge_all_conservative<'a, I>(graphs: I) -> CredResult<Graph>
    where
        I: IntoIterator<Item = &'a Graph>,
    {
        let mut result = Graph::new();
        let graphs: Vec<&Graph> = graphs.into_iter().collect();
        for graph in &graphs {
            for node in graph.nodes.values() {
                result.add_node(node.clone())?;
            }
        }
        for graph in &graphs {
            for edge in graph.edges.values() {
                result.add_edge_with(edge.clone(), EndpointPolicy::AllowDangling)?;
            }
        }
        Ok(result)
    }

    /// A copy of this graph without its dangling edges.
    pub fn without_dangling_edges(&self) -> Graph {
        let mut result = self.clone();
        let dangling: Vec<EdgeAddress> = self
            .edges
            .values()
            .filter(|edge| !self.is_resolved(edge))
            .map(|edge| edge.address.clone())
            .collect();
        for address in &dangling {
            result.remove_edge(address);
        }
        result
    }

    /// A copy of this graph with every node's mint weight set by `weight_of`.
    pub fn with_mint_weights<F>(&self, weight_of: F) -> Graph
    where
        F: Fn(&Node) -> f64,
    {
        let mut result = self.clone();
        for node in result.nodes.values_mut() {
            node.mint_weight = weight_of(node);
        }
        result
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges
    }
}
