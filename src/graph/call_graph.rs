// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};

use crate::ir::{BaseCallSite, FuncRef, Program};

/// Unique identifiers for call graph nodes.
pub type CGNodeId = NodeIndex<DefaultIx>;
/// Unique identifiers for call graph edges.
pub type CGEdgeId = EdgeIndex<DefaultIx>;

#[derive(Debug)]
pub struct CallGraphNode {
    pub(crate) func: FuncRef,
}

#[derive(Debug)]
pub struct CallGraphEdge {
    pub(crate) callsite: BaseCallSite,
}

/// The callee relation: one node per function, one edge per
/// (call site, callee) pair.
pub struct CallGraph {
    /// The graph structure capturing call relationships.
    pub graph: Graph<CallGraphNode, CallGraphEdge>,
    /// A map from functions to their corresponding call graph nodes.
    pub func_nodes: HashMap<FuncRef, CGNodeId>,
    /// A map from call sites to call graph edges.
    pub callsite_to_edges: HashMap<BaseCallSite, HashSet<CGEdgeId>>,
}

impl CallGraph {
    pub fn new() -> Self {
        CallGraph {
            graph: Graph::new(),
            func_nodes: HashMap::new(),
            callsite_to_edges: HashMap::new(),
        }
    }

    /// Add a new node to the call graph.
    pub fn add_node(&mut self, func: FuncRef) {
        if let Entry::Vacant(e) = self.func_nodes.entry(func) {
            let node_id = self.graph.add_node(CallGraphNode { func });
            e.insert(node_id);
        }
    }

    /// Helper function to get a node or insert a new
    /// node if it does not exist in the map.
    fn get_or_insert_node(&mut self, func: FuncRef) -> CGNodeId {
        match self.func_nodes.entry(func) {
            Entry::Occupied(o) => o.get().to_owned(),
            Entry::Vacant(v) => {
                let node_id = self.graph.add_node(CallGraphNode { func });
                *v.insert(node_id)
            }
        }
    }

    /// All callees recorded for a call site.
    pub fn get_callees(&self, callsite: &BaseCallSite) -> HashSet<FuncRef> {
        if let Some(edges) = self.callsite_to_edges.get(callsite) {
            edges
                .iter()
                .filter_map(|edge_id| match self.graph.edge_endpoints(*edge_id) {
                    Some((_, target)) => Some(self.graph.node_weight(target).unwrap().func),
                    None => None,
                })
                .collect::<HashSet<FuncRef>>()
        } else {
            HashSet::new()
        }
    }

    /// Returns true if an edge to the callee already existed for the callsite.
    pub fn has_edge(&self, callsite: &BaseCallSite, callee: FuncRef) -> bool {
        self.get_callees(callsite).contains(&callee)
    }

    /// Adds a new edge to the call graph.
    /// The edge is a call from `caller` to `callee` at `callsite`.
    /// Returns false if the edge already existed, and true otherwise.
    pub fn add_edge(&mut self, callsite: BaseCallSite, caller: FuncRef, callee: FuncRef) -> bool {
        let caller_node = self.get_or_insert_node(caller);
        let callee_node = self.get_or_insert_node(callee);

        if self.has_edge(&callsite, callee) {
            return false;
        }
        let edge_id = self
            .graph
            .add_edge(caller_node, callee_node, CallGraphEdge { callsite });
        self.callsite_to_edges
            .entry(callsite)
            .or_default()
            .insert(edge_id);
        true
    }

    /// All call sites with at least one recorded callee.
    pub fn callsites(&self) -> impl Iterator<Item = &BaseCallSite> {
        self.callsite_to_edges.keys()
    }

    /// Call sites whose edges target `func`.
    pub fn callers_of(&self, func: FuncRef) -> HashSet<BaseCallSite> {
        let Some(node) = self.func_nodes.get(&func) else {
            return HashSet::new();
        };
        self.graph
            .edges_directed(*node, Direction::Incoming)
            .map(|e| e.weight().callsite)
            .collect()
    }

    /// Produce a dot file representation of the call graph
    /// for displaying with Graphviz.
    pub fn to_dot(&self, program: &Program, dot_path: &std::path::Path) -> std::io::Result<()> {
        let mut output = String::new();
        output.push_str("digraph callgraph {\n");
        for node_id in self.graph.node_indices() {
            let func = self.graph[node_id].func;
            let _ = writeln!(
                output,
                "    n{} [label=\"{}\"];",
                node_id.index(),
                program.func_name(func)
            );
        }
        for edge in self.graph.edge_references() {
            let site = edge.weight().callsite;
            let _ = writeln!(
                output,
                "    n{} -> n{} [label=\"{}:{}\"];",
                edge.source().index(),
                edge.target().index(),
                site.loc.block,
                site.loc.inst
            );
        }
        output.push_str("}\n");
        std::fs::write(dot_path, output)
    }
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}
