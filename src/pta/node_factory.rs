// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The node factory: owner of every abstract-location index.
//!
//! Indices are dense and immutable once assigned. Four special nodes occupy
//! the low indices: the universal pointer/object pair and the null
//! pointer/object pair. Every other node is a value node (one per SSA value
//! that can carry pointer information), an object node (one per expanded
//! field of an allocation site), a return node or a vararg node.
//!
//! Object nodes of one allocation site form a contiguous group
//! `[base, base + size)`, so field addressing is index arithmetic off the
//! base. An *opaque* heap object has size 1 until a GEP reveals its record
//! type; growing it allocates a fresh contiguous group and leaves a
//! forwarding link behind ([`canonical_object`]), so stale indices in
//! points-to sets stay valid.
//!
//! [`canonical_object`]: NodeFactory::canonical_object

use std::collections::HashMap;
use std::fmt;

use crate::ir::{FuncRef, ValueRef};
use crate::pta::PtsGraph;
use crate::struct_analyzer::StructInfo;
use crate::util::bit_vec::Idx;

/// A dense nonnegative integer identifying one abstract location.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(u32);

impl Idx for NodeIndex {
    #[inline]
    fn new(idx: usize) -> Self {
        assert!(idx <= u32::MAX as usize);
        NodeIndex(idx as u32)
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

pub const UNIVERSAL_PTR: NodeIndex = NodeIndex(0);
pub const UNIVERSAL_OBJ: NodeIndex = NodeIndex(1);
pub const NULL_PTR: NodeIndex = NodeIndex(2);
pub const NULL_OBJ: NodeIndex = NodeIndex(3);
const NUM_SPECIAL_NODES: usize = 4;

#[derive(Debug)]
enum NodeInfo {
    Special,
    Value(ValueRef),
    Object(ObjectNode),
    Return(FuncRef),
    Vararg(FuncRef),
}

#[derive(Debug)]
struct ObjectNode {
    base: NodeIndex,
    offset: u32,
    /// Group size; meaningful at the base node.
    size: u32,
    is_heap: bool,
    is_union: bool,
    opaque: bool,
    /// The allocation-site value, absent for synthesized objects.
    site: Option<ValueRef>,
}

pub struct NodeFactory {
    nodes: Vec<NodeInfo>,
    value_nodes: HashMap<ValueRef, NodeIndex>,
    object_nodes: HashMap<ValueRef, NodeIndex>,
    return_nodes: HashMap<FuncRef, NodeIndex>,
    vararg_nodes: HashMap<FuncRef, NodeIndex>,
    /// Forwarding links left behind by opaque-heap resizes.
    extended: HashMap<NodeIndex, NodeIndex>,
}

impl NodeFactory {
    pub fn new() -> Self {
        let mut nodes = Vec::new();
        for _ in 0..NUM_SPECIAL_NODES {
            nodes.push(NodeInfo::Special);
        }
        NodeFactory {
            nodes,
            value_nodes: HashMap::new(),
            object_nodes: HashMap::new(),
            return_nodes: HashMap::new(),
            vararg_nodes: HashMap::new(),
            extended: HashMap::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, info: NodeInfo) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(info);
        idx
    }

    pub fn get_null_object_node(&self) -> NodeIndex {
        NULL_OBJ
    }

    // ---- value nodes ----

    pub fn create_value_node(&mut self, val: ValueRef) -> NodeIndex {
        if let Some(&idx) = self.value_nodes.get(&val) {
            return idx;
        }
        let idx = self.alloc(NodeInfo::Value(val));
        self.value_nodes.insert(val, idx);
        idx
    }

    pub fn get_value_node(&self, val: ValueRef) -> Option<NodeIndex> {
        self.value_nodes.get(&val).copied()
    }

    /// Like `get_value_node`, but a missing node is a factory/IR desync and
    /// therefore fatal.
    pub fn value_node(&self, val: ValueRef) -> NodeIndex {
        match self.get_value_node(val) {
            Some(idx) => idx,
            None => panic!("value node not found for {:?}", val),
        }
    }

    // ---- return / vararg nodes ----

    pub fn create_return_node(&mut self, func: FuncRef) -> NodeIndex {
        if let Some(&idx) = self.return_nodes.get(&func) {
            return idx;
        }
        let idx = self.alloc(NodeInfo::Return(func));
        self.return_nodes.insert(func, idx);
        idx
    }

    pub fn get_return_node(&self, func: FuncRef) -> Option<NodeIndex> {
        self.return_nodes.get(&func).copied()
    }

    pub fn return_node(&self, func: FuncRef) -> NodeIndex {
        match self.get_return_node(func) {
            Some(idx) => idx,
            None => panic!("return node not found for {:?}", func),
        }
    }

    pub fn create_vararg_node(&mut self, func: FuncRef) -> NodeIndex {
        if let Some(&idx) = self.vararg_nodes.get(&func) {
            return idx;
        }
        let idx = self.alloc(NodeInfo::Vararg(func));
        self.vararg_nodes.insert(func, idx);
        idx
    }

    pub fn vararg_node(&self, func: FuncRef) -> NodeIndex {
        match self.vararg_nodes.get(&func).copied() {
            Some(idx) => idx,
            None => panic!("vararg node not found for {:?}", func),
        }
    }

    // ---- object nodes ----

    /// Creates an object group for an allocation site: one node per expanded
    /// field, contiguous from the returned base.
    pub fn create_object_node(
        &mut self,
        site: Option<ValueRef>,
        layout: Option<&StructInfo>,
        is_heap: bool,
    ) -> NodeIndex {
        if let Some(site) = site {
            if let Some(&base) = self.object_nodes.get(&site) {
                return base;
            }
        }
        let size = layout.map_or(1, |info| info.expanded_size().max(1));
        let base = NodeIndex(self.nodes.len() as u32);
        for offset in 0..size {
            let is_union = layout.map_or(false, |info| info.is_field_union(offset));
            self.nodes.push(NodeInfo::Object(ObjectNode {
                base,
                offset,
                size,
                is_heap,
                is_union,
                opaque: false,
                site,
            }));
        }
        if let Some(site) = site {
            self.object_nodes.insert(site, base);
        }
        base
    }

    /// Creates a size-1 heap object whose record type is not yet known.
    /// Memoized per call site so repeated fixpoint passes converge.
    pub fn create_opaque_object_node(&mut self, site: ValueRef, is_heap: bool) -> NodeIndex {
        if let Some(&base) = self.object_nodes.get(&site) {
            return base;
        }
        let base = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(NodeInfo::Object(ObjectNode {
            base,
            offset: 0,
            size: 1,
            is_heap,
            is_union: false,
            opaque: true,
            site: Some(site),
        }));
        self.object_nodes.insert(site, base);
        base
    }

    pub fn get_object_node(&self, site: ValueRef) -> Option<NodeIndex> {
        self.object_nodes.get(&site).copied()
    }

    pub fn object_node(&self, site: ValueRef) -> NodeIndex {
        match self.get_object_node(site) {
            Some(idx) => idx,
            None => panic!("object node not found for {:?}", site),
        }
    }

    /// Grows an opaque heap object to a full record layout.
    ///
    /// A fresh contiguous group is allocated, the stale base keeps its index
    /// and forwards here, and whatever the stale base pointed to is carried
    /// over. Returns the new base.
    pub fn extend_object_node(
        &mut self,
        base: NodeIndex,
        layout: &StructInfo,
        pts_graph: &mut PtsGraph,
    ) -> NodeIndex {
        let base = self.canonical_object(base);
        if let Some(&fwd) = self.extended.get(&base) {
            return fwd;
        }
        debug_assert!(self.is_opaque_object(base), "resizing a typed object");
        let new_base = self.create_object_node(None, Some(layout), true);
        self.extended.insert(base, new_base);
        pts_graph.union_into(new_base, base);
        new_base
    }

    /// Resolves resize forwarding; identity for everything else.
    pub fn canonical_object(&self, mut idx: NodeIndex) -> NodeIndex {
        while let Some(&fwd) = self.extended.get(&idx) {
            idx = fwd;
        }
        idx
    }

    // ---- predicates and group bookkeeping ----

    pub fn is_special_node(&self, idx: NodeIndex) -> bool {
        (idx.0 as usize) < NUM_SPECIAL_NODES
    }

    pub fn is_object_node(&self, idx: NodeIndex) -> bool {
        matches!(self.nodes[idx.index()], NodeInfo::Object(_))
    }

    pub fn is_heap_object(&self, idx: NodeIndex) -> bool {
        matches!(&self.nodes[idx.index()], NodeInfo::Object(o) if o.is_heap)
    }

    pub fn is_opaque_object(&self, idx: NodeIndex) -> bool {
        matches!(&self.nodes[idx.index()], NodeInfo::Object(o) if o.opaque)
    }

    pub fn is_union_object(&self, idx: NodeIndex) -> bool {
        matches!(&self.nodes[idx.index()], NodeInfo::Object(o) if o.is_union)
    }

    fn object(&self, idx: NodeIndex) -> &ObjectNode {
        match &self.nodes[idx.index()] {
            NodeInfo::Object(o) => o,
            other => panic!("node {} is not an object: {:?}", idx, other),
        }
    }

    pub fn base_of(&self, idx: NodeIndex) -> NodeIndex {
        self.object(idx).base
    }

    /// Group size, queryable through any member of the group.
    pub fn get_object_size(&self, idx: NodeIndex) -> u32 {
        let base = self.object(idx).base;
        self.object(base).size
    }

    pub fn get_object_offset(&self, idx: NodeIndex) -> u32 {
        self.object(idx).offset
    }

    /// Inverse lookup: the allocation-site value of an object group.
    pub fn get_value_for_node(&self, idx: NodeIndex) -> Option<ValueRef> {
        match &self.nodes[idx.index()] {
            NodeInfo::Object(o) => self.object(o.base).site,
            _ => None,
        }
    }
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::builder::ModuleBuilder;
    use crate::ir::{FuncId, LocalId, ModuleId, Type};
    use crate::struct_analyzer::StructAnalyzer;

    fn fref(f: u32) -> FuncRef {
        FuncRef {
            module: ModuleId(0),
            func: FuncId(f),
        }
    }

    fn local(f: u32, l: u32) -> ValueRef {
        ValueRef::Local {
            func: fref(f),
            local: LocalId(l),
        }
    }

    #[test]
    fn specials_come_first() {
        let nf = NodeFactory::new();
        assert!(nf.is_special_node(UNIVERSAL_PTR));
        assert!(nf.is_special_node(NULL_OBJ));
        assert_eq!(nf.get_null_object_node(), NULL_OBJ);
        assert_eq!(nf.num_nodes(), 4);
    }

    #[test]
    fn value_nodes_are_stable() {
        let mut nf = NodeFactory::new();
        let a = nf.create_value_node(local(0, 0));
        let b = nf.create_value_node(local(0, 1));
        assert_ne!(a, b);
        assert_eq!(nf.create_value_node(local(0, 0)), a);
        assert_eq!(nf.value_node(local(0, 1)), b);
        assert!(nf.get_value_node(local(0, 2)).is_none());
    }

    #[test]
    fn object_groups_are_contiguous() {
        let module = {
            let mut mb = ModuleBuilder::new("t");
            mb.define_named_type(
                "struct.s",
                vec![Type::int(64), Type::ptr(Type::int(8)), Type::int(32)],
            );
            mb.build()
        };
        let mut sa = StructAnalyzer::new();
        let si = sa.get_struct_info(&Type::named("struct.s"), &module).unwrap();

        let mut nf = NodeFactory::new();
        let base = nf.create_object_node(Some(local(0, 0)), Some(sa.info(si)), false);
        assert_eq!(nf.get_object_size(base), 3);
        for k in 0..3u32 {
            let o = base.plus(k as usize);
            assert!(nf.is_object_node(o));
            assert_eq!(nf.base_of(o), base);
            assert_eq!(nf.get_object_offset(o), k);
            // round-trip: base + offset == o
            assert_eq!(nf.base_of(o).plus(nf.get_object_offset(o) as usize), o);
            assert!(nf.get_object_offset(o) < nf.get_object_size(base));
        }
        assert_eq!(nf.get_value_for_node(base.plus(2)), Some(local(0, 0)));
    }

    #[test]
    fn opaque_resize_forwards_and_preserves_pointees() {
        let module = {
            let mut mb = ModuleBuilder::new("t");
            mb.define_named_type("struct.s", vec![Type::int(64), Type::ptr(Type::int(8))]);
            mb.build()
        };
        let mut sa = StructAnalyzer::new();
        let si = sa.get_struct_info(&Type::named("struct.s"), &module).unwrap();

        let mut nf = NodeFactory::new();
        let mut pts = crate::pta::PtsGraph::new();
        let heap = nf.create_opaque_object_node(local(0, 0), true);
        assert!(nf.is_opaque_object(heap));
        assert_eq!(nf.get_object_size(heap), 1);

        // something stored through the opaque base
        let fn_obj = nf.create_object_node(Some(ValueRef::Function(fref(1))), None, false);
        pts.insert(heap, fn_obj);

        let info = sa.info(si).clone();
        let new_base = nf.extend_object_node(heap, &info, &mut pts);
        assert_ne!(new_base, heap);
        assert_eq!(nf.canonical_object(heap), new_base);
        assert_eq!(nf.get_object_size(new_base), 2);
        assert!(!nf.is_opaque_object(new_base));
        assert!(nf.is_heap_object(new_base));
        // pointees carried over to the new base
        assert!(pts.pts(new_base).unwrap().contains(fn_obj));
        // a second resize request lands on the same group
        assert_eq!(nf.extend_object_node(heap, &info, &mut pts), new_base);
    }

    #[test]
    fn opaque_objects_are_memoized_per_site() {
        let mut nf = NodeFactory::new();
        let a = nf.create_opaque_object_node(local(0, 3), true);
        let b = nf.create_opaque_object_node(local(0, 3), true);
        let c = nf.create_opaque_object_node(local(0, 4), true);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
