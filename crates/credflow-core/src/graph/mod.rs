pub mod address;
pub mod json;
pub mod multigraph;
pub mod weighted;
pub mod weights;

pub use address::{EdgeAddress, NodeAddress};
pub use multigraph::{Direction, Edge, EdgeFilter, EndpointPolicy, Graph, Neighbor, Node};
pub use weighted::{WeightedGraph, WeightedGraphJson};
pub use weights::{EdgeType, EdgeWeight, NodeType, Weights};
