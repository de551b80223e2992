//! Canonical JSON form of a [`Graph`].

use serde::{Deserialize, Serialize};

use crate::errors::{CredError, CredResult};
use crate::graph::multigraph::{Edge, EdgeFilter, EndpointPolicy, Graph, Node};

pub const GRAPH_JSON_TYPE: &str = "credflow/graph";

/// Schema version of [`GraphJson`].
pub const GRAPH_JSON_VERSION: i64 = 1;

/// Nodes and edges sorted by address, so equal graphs encode identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: i64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn to_json(&self) -> GraphJson {
        let mut nodes: Vec<Node> = self.nodes(None).cloned().collect();
        nodes.sort_by(|a, b| a.address.cmp(&b.address));
        let mut edges: Vec<Edge> = self.edges(&EdgeFilter::all()).cloned().collect();
        edges.sort_by(|a, b| a.address.cmp(&b.address));
        GraphJson {
            kind: GRAPH_JSON_TYPE.to_string(),
            version: GRAPH_JSON_VERSION,
            nodes,
            edges,
        }
    }

    pub fn from_json(json: GraphJson) -> CredResult<Graph> {
        if json.kind != GRAPH_JSON_TYPE || json.version != GRAPH_JSON_VERSION {
            return Err(CredError::Compat {
                expected: format!("{GRAPH_JSON_TYPE} v{GRAPH_JSON_VERSION}"),
                found: format!("{} v{}", json.kind, json.version),
            });
        }
        let mut graph = Graph::new();
        for node in json.nodes {
            graph.add_node(node)?;
        }
        for edge in json.edges {
            graph.add_edge_with(edge, EndpointPolicy::AllowDangling)?;
        }
        Ok(graph)
    }

    pub fn to_json_string(&self) -> CredResult<String> {
        Ok(serde_json::to_string(&self.to_json())?)
    }

    pub fn from_json_str(json: &str) -> CredResult<Graph> {
        Graph::from_json(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::address::NodeAddress;
    use crate::graph::multigraph::tests::{make_edge, make_node};

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(make_node("b").with_mint_weight(2.5)).unwrap();
        graph.add_node(make_node("a")).unwrap();
        graph
            .add_node(Node::new(
                NodeAddress::from_parts(["test", "node", "untimed"]).unwrap(),
                "no timestamp",
                None,
            ))
            .unwrap();
        graph.add_edge(make_edge("ba", "b", "a")).unwrap();
        graph
            .add_edge_with(make_edge("ax", "a", "x"), EndpointPolicy::AllowDangling)
            .unwrap();
        graph
    }

    #[test]
    fn round_trip_is_exact() {
        let graph = sample();
        let restored = Graph::from_json_str(&graph.to_json_string().unwrap()).unwrap();
        assert_eq!(restored, graph);
        assert!(restored.is_dangling(&make_edge("ax", "a", "x").address));
        assert_eq!(
            restored.out_edges(&make_node("b").address).unwrap().count(),
            1
        );
    }

    #[test]
    fn encoding_is_order_independent() {
        let mut other = Graph::new();
        other
            .add_edge_with(make_edge("ax", "a", "x"), EndpointPolicy::AllowDangling)
            .unwrap();
        other.add_node(make_node("a")).unwrap();
        other
            .add_node(Node::new(
                NodeAddress::from_parts(["test", "node", "untimed"]).unwrap(),
                "no timestamp",
                None,
            ))
            .unwrap();
        other.add_node(make_node("b").with_mint_weight(2.5)).unwrap();
        other.add_edge(make_edge("ba", "b", "a")).unwrap();
        assert_eq!(
            other.to_json_string().unwrap(),
            sample().to_json_string().unwrap()
        );
    }

    #[test]
    fn field_names_are_camel_case() {
        let json = sample().to_json_string().unwrap();
        assert!(json.starts_with(r#"{"type":"credflow/graph","version":1"#));
        assert!(json.contains("\"timestampMs\":null"));
        assert!(json.contains("\"mintWeight\":2.5"));
    }

    #[test]
    fn wrong_header_is_rejected() {
        let mut json = sample().to_json();
        json.version = 99;
        let err = Graph::from_json(json).unwrap_err();
        assert!(matches!(err, CredError::Compat { .. }));
    }
}
