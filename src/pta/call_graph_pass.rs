// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The call graph pass: per-instruction transfer functions over the
//! points-to graph, callee resolution at call sites, and the type-shortcut
//! heuristic.
//!
//! The pass runs as an iterative module pass: `do_initialization` registers
//! per-module facts (address-taken functions, entry seeds, shortcut
//! candidates), `do_module_pass` applies the transfer functions to every
//! function body until quiescent or the sweep bound is hit, and
//! `do_finalization` derives the caller relation and the type-based
//! fallback for indirect sites.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, warn};

use crate::ir::{
    element_ty, BaseCallSite, Callee, FuncId, FuncRef, Function, GepIndex, GlobalId, GlobalRef,
    InstDisplay, InstLoc, Instruction, LocalId, Module, ModuleId, Opcode, Operand, Type, TypeRef,
    ValueRef,
};
use crate::struct_analyzer::{gep_byte_offset, offset_to_field_num, StructInfoId};
use crate::util::bit_vec::Idx;
use crate::util::type_util::is_compatible_type;

use super::node_factory::{NodeIndex, NULL_OBJ, NULL_PTR, UNIVERSAL_PTR};
use super::{GlobalContext, IterativeModulePass, PtsGraph};

pub struct CallGraphPass<'a> {
    ctx: &'a mut GlobalContext,

    /// The function-pointer points-to graph, seeded from the global-init
    /// graph and grown monotonically.
    func_pts_graph: PtsGraph,

    reachable: HashSet<FuncRef>,
    /// Reachable but not yet processed this round.
    unvisited: HashSet<FuncRef>,
    /// Indirect callee operands whose points-to set is still empty.
    unresolved_fpts: HashSet<NodeIndex>,

    /// One synthesized abstract object per chosen record type.
    type_shortcuts: BTreeMap<StructInfoId, NodeIndex>,
    /// Nodes collapsed into a shortcut; normal propagation skips them.
    type_shortcuts_obj: HashSet<NodeIndex>,
    ret_structs: BTreeMap<StructInfoId, BTreeSet<NodeIndex>>,
    arg_structs: BTreeMap<StructInfoId, BTreeSet<NodeIndex>>,
    global_structs: BTreeMap<StructInfoId, BTreeSet<NodeIndex>>,

    /// Type-based fallback candidates for indirect sites.
    callee_by_type: HashMap<BaseCallSite, HashSet<FuncRef>>,
}

impl<'a> CallGraphPass<'a> {
    pub fn new(ctx: &'a mut GlobalContext) -> Self {
        let func_pts_graph = ctx.global_init_pts_graph.clone();
        CallGraphPass {
            ctx,
            func_pts_graph,
            reachable: HashSet::new(),
            unvisited: HashSet::new(),
            unresolved_fpts: HashSet::new(),
            type_shortcuts: BTreeMap::new(),
            type_shortcuts_obj: HashSet::new(),
            ret_structs: BTreeMap::new(),
            arg_structs: BTreeMap::new(),
            global_structs: BTreeMap::new(),
            callee_by_type: HashMap::new(),
        }
    }

    pub fn ctx(&self) -> &GlobalContext {
        self.ctx
    }

    pub fn reachable(&self) -> &HashSet<FuncRef> {
        &self.reachable
    }

    pub fn unvisited(&self) -> &HashSet<FuncRef> {
        &self.unvisited
    }

    pub fn unresolved_fpts(&self) -> &HashSet<NodeIndex> {
        &self.unresolved_fpts
    }

    pub fn callee_by_type(&self) -> &HashMap<BaseCallSite, HashSet<FuncRef>> {
        &self.callee_by_type
    }

    pub fn pts_graph(&self) -> &PtsGraph {
        &self.func_pts_graph
    }

    // ---- node lookup helpers ----

    fn try_operand_value_node(&self, func: FuncRef, op: &Operand) -> Option<NodeIndex> {
        let nf = &self.ctx.node_factory;
        match op {
            Operand::Local(l) => nf.get_value_node(ValueRef::Local {
                func,
                local: *l,
            }),
            Operand::Global(g) => nf.get_value_node(ValueRef::Global(GlobalRef {
                module: func.module,
                global: *g,
            })),
            Operand::Function(f) => nf.get_value_node(ValueRef::Function(FuncRef {
                module: func.module,
                func: *f,
            })),
            // Non-pointer constants are conflated with null; undef may be
            // anything.
            Operand::Null | Operand::Int(_) => Some(NULL_PTR),
            Operand::Undef => Some(UNIVERSAL_PTR),
        }
    }

    fn operand_value_node(&self, func: FuncRef, op: &Operand) -> NodeIndex {
        match self.try_operand_value_node(func, op) {
            Some(idx) => idx,
            None => panic!(
                "value node not found for operand {:?} in {}",
                op,
                self.ctx.program.func_name(func)
            ),
        }
    }

    fn result_node(&self, func: FuncRef, inst: &Instruction) -> NodeIndex {
        let result = inst.result.expect("instruction has no result value");
        self.ctx.node_factory.value_node(ValueRef::Local {
            func,
            local: result,
        })
    }

    fn inst_text(&self, module: ModuleId, inst: &Instruction) -> String {
        InstDisplay {
            inst,
            module: self.ctx.program.module(module),
        }
        .to_string()
    }

    // ---- transfer functions ----

    fn run_on_function(&mut self, fref: FuncRef) -> bool {
        debug!(
            "###### processing function {}",
            self.ctx.program.func_name(fref)
        );
        self.unvisited.remove(&fref);

        let block_sizes: Vec<usize> = self
            .ctx
            .program
            .func(fref)
            .blocks
            .iter()
            .map(|b| b.insts.len())
            .collect();

        let mut changed = false;
        for (b, &len) in block_sizes.iter().enumerate() {
            for i in 0..len {
                let inst = self.ctx.program.func(fref).blocks[b].insts[i].clone();
                let loc = InstLoc {
                    block: b as u32,
                    inst: i as u32,
                };
                changed |= self.transfer(fref, loc, &inst);
            }
        }
        changed
    }

    fn transfer(&mut self, fref: FuncRef, loc: InstLoc, inst: &Instruction) -> bool {
        match &inst.op {
            // No pointer information is produced or moved here.
            Opcode::Br
            | Opcode::Switch
            | Opcode::Unreachable
            | Opcode::Binary { .. }
            | Opcode::ICmp { .. }
            | Opcode::FCmp { .. }
            | Opcode::SExt { .. }
            | Opcode::ZExt { .. }
            | Opcode::Trunc { .. } => false,

            // Object nodes were created at factory initialization.
            Opcode::Alloca { .. } => false,

            Opcode::Ret { value } => self.transfer_ret(fref, value.as_ref()),
            Opcode::Call { .. } | Opcode::Invoke { .. } => self.transfer_call(fref, loc, inst),
            Opcode::Load { address } => self.transfer_load(fref, inst, address),
            Opcode::Store { value, address } => self.transfer_store(fref, value, address),
            Opcode::Gep {
                address,
                source,
                indices,
            } => self.transfer_gep(fref, inst, address, source, indices),

            Opcode::BitCast { value } => {
                let src = self.operand_value_node(fref, value);
                let dst = self.result_node(fref, inst);
                self.func_pts_graph.union_into(dst, src) > 0
            }
            Opcode::Phi { incoming } => {
                let dst = self.result_node(fref, inst);
                let mut changed = false;
                for src_op in incoming {
                    let src = self.operand_value_node(fref, src_op);
                    changed |= self.func_pts_graph.union_into(dst, src) > 0;
                }
                changed
            }
            Opcode::Select {
                true_value,
                false_value,
                ..
            } => {
                let dst = self.result_node(fref, inst);
                let mut changed = false;
                for src_op in [true_value, false_value] {
                    let src = self.operand_value_node(fref, src_op);
                    changed |= self.func_pts_graph.union_into(dst, src) > 0;
                }
                changed
            }

            Opcode::PtrToInt { .. } | Opcode::IntToPtr { .. } => {
                warn!(
                    "unhandled instruction: {}",
                    self.inst_text(fref.module, inst)
                );
                false
            }
        }
    }

    fn transfer_ret(&mut self, fref: FuncRef, value: Option<&Operand>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let rv_node = self.operand_value_node(fref, value);
        let rt = self.ctx.node_factory.return_node(fref);
        if self.type_shortcuts_obj.contains(&rt) {
            return false;
        }
        let added = self.func_pts_graph.union_into(rt, rv_node);
        if added > 0 {
            debug!(
                "ret: {} <- {} pointees in {}",
                rt,
                added,
                self.ctx.program.func_name(fref)
            );
        }
        added > 0
    }

    fn transfer_call(&mut self, fref: FuncRef, loc: InstLoc, inst: &Instruction) -> bool {
        let (callee, args) = inst.call_parts().expect("not a call");
        let site = BaseCallSite { func: fref, loc };

        match callee {
            Callee::InlineAsm => false,

            Callee::Function(cid) => {
                // direct call
                let cf = self.ctx.get_func_def(FuncRef {
                    module: fref.module,
                    func: *cid,
                });
                if self.reachable.insert(cf) {
                    self.unvisited.insert(cf);
                }
                self.ctx.call_graph.add_edge(site, fref, cf);
                self.handle_call(fref, site, inst, args, cf)
            }

            Callee::Pointer(op) => {
                // indirect call
                let callee_node = self.operand_value_node(fref, op);
                let elems = self.func_pts_graph.elems(callee_node);
                if elems.is_empty() {
                    debug!(
                        "indirect call: callee not found in the graph: {}",
                        callee_node
                    );
                    let targets = self.find_callees_by_type(fref, inst, args);
                    if !targets.is_empty() {
                        self.unresolved_fpts.insert(callee_node);
                    }
                    self.callee_by_type.insert(site, targets);
                    return false;
                }

                let mut changed = false;
                for idx in elems {
                    debug!("indirect call: callee obj {}", idx);
                    if self.ctx.node_factory.is_special_node(idx) {
                        warn!("indirect call: callee is a special node: {}", idx);
                        continue;
                    }
                    assert!(
                        self.ctx.node_factory.is_object_node(idx),
                        "function pointer points to non-object"
                    );
                    let Some(val) = self.ctx.node_factory.get_value_for_node(idx) else {
                        warn!("no value for function node {}", idx);
                        continue;
                    };
                    let ValueRef::Function(cf) = val else {
                        warn!(
                            "function pointer {} points to non-function: {:?}",
                            callee_node, val
                        );
                        continue;
                    };
                    if self.reachable.insert(cf) {
                        self.unvisited.insert(cf);
                    }
                    self.ctx.call_graph.add_edge(site, fref, cf);
                    debug!(
                        "indirect call: callee {}",
                        self.ctx.program.func_name(cf)
                    );
                    changed |= self.handle_call(fref, site, inst, args, cf);
                }
                self.unresolved_fpts.remove(&callee_node);
                changed
            }
        }
    }

    /// Binds arguments and the return value of one resolved call.
    fn handle_call(
        &mut self,
        caller: FuncRef,
        _site: BaseCallSite,
        inst: &Instruction,
        args: &[Operand],
        cf: FuncRef,
    ) -> bool {
        let (is_intrinsic, is_decl, is_var_arg, arity, ret_void, cf_name) = {
            let f = self.ctx.program.func(cf);
            (
                f.is_intrinsic(),
                f.is_declaration(),
                f.is_var_arg,
                f.arg_size(),
                f.return_type.is_void(),
                f.name.clone(),
            )
        };
        if is_intrinsic {
            return false;
        }
        if is_decl {
            // external function, nothing to bind
            warn!("call: {} is empty", cf_name);
            return false;
        }

        let mut changed = false;

        if is_var_arg {
            let _formal = self.ctx.node_factory.vararg_node(cf);
            for (i, arg) in args.iter().enumerate() {
                if self.try_operand_value_node(caller, arg).is_none() {
                    warn!("vararg: actual ({}) {:?} node not found", i, arg);
                }
                // no propagation into the vararg slot
            }
        } else {
            if args.len() != arity {
                warn!(
                    "call argument number mismatch: {} -> {}",
                    self.inst_text(caller.module, inst),
                    cf_name
                );
                return false;
            }
            for (i, arg) in args.iter().enumerate() {
                let arg_node = self.operand_value_node(caller, arg);
                match self.func_pts_graph.pts(arg_node) {
                    Some(set) if !set.is_empty() => {}
                    _ => continue,
                }
                let formal = self.ctx.node_factory.value_node(ValueRef::Local {
                    func: cf,
                    local: LocalId(i as u32),
                });
                // skip args bound to a type shortcut
                if self.type_shortcuts_obj.contains(&formal) {
                    continue;
                }
                if self.func_pts_graph.union_into(formal, arg_node) > 0 {
                    debug!("arg ({}) bound for call to {}", i, cf_name);
                    changed = true;
                }
            }
        }

        if !ret_void {
            let ret_node = self.ctx.node_factory.return_node(cf);
            let Some(call_result) = inst.result else {
                // shape mismatch: a void call site resolved to a non-void callee
                warn!("call: no result value at call to {}", cf_name);
                return changed;
            };
            let call_site_value = ValueRef::Local {
                func: caller,
                local: call_result,
            };
            let call_node = self.ctx.node_factory.value_node(call_site_value);
            for idx in self.func_pts_graph.elems(ret_node) {
                let mut idx = self.ctx.node_factory.canonical_object(idx);
                // A returned opaque heap object from a function named like an
                // allocator means this is an allocation wrapper: give the call
                // site its own heap object.
                if self.ctx.node_factory.is_heap_object(idx)
                    && self.ctx.node_factory.is_opaque_object(idx)
                    && cf_name.contains("alloc")
                {
                    idx = self
                        .ctx
                        .node_factory
                        .create_opaque_object_node(call_site_value, true);
                    warn!("call: treating {} as an allocator ({})", cf_name, idx);
                }
                debug!("ret: obj = {}", idx);
                changed |= self.func_pts_graph.insert(call_node, idx);
            }
        }

        changed
    }

    fn transfer_load(&mut self, fref: FuncRef, inst: &Instruction, address: &Operand) -> bool {
        let val_node = self.result_node(fref, inst);
        // fast path: this load is already collapsed into a shortcut
        if self.type_shortcuts_obj.contains(&val_node) {
            return false;
        }

        let mut changed = false;
        let mut type_shortcut = false;
        let shortcut = {
            let ctx = &mut *self.ctx;
            let module = ctx.program.module(fref.module);
            inst.ty
                .pointee()
                .and_then(|pointee| ctx.struct_analyzer.get_struct_info(pointee, module))
                .and_then(|si| self.type_shortcuts.get(&si).copied())
        };
        if let Some(shortcut_obj) = shortcut {
            changed |= self.func_pts_graph.insert(val_node, shortcut_obj);
            debug!("load: apply type shortcut: {}", shortcut_obj);
            self.type_shortcuts_obj.insert(val_node);
            type_shortcut = true;
        }

        let ptr_node = self.operand_value_node(fref, address);
        let elems = self.func_pts_graph.elems(ptr_node);
        let last = elems.last().copied();
        for idx in elems {
            debug!("load: source obj {}", idx);
            if idx == NULL_OBJ {
                // Loading from null alone propagates null without following.
                if last == Some(NULL_OBJ) {
                    debug!("loading from null obj, ptr = {}", ptr_node);
                    self.func_pts_graph.insert(val_node, NULL_OBJ);
                }
                continue;
            }
            let o = self.ctx.node_factory.canonical_object(idx);
            let added = self.func_pts_graph.union_into(val_node, o);
            if added > 0 {
                changed = true;
                if type_shortcut {
                    warn!("non-empty points-to set for type shortcut");
                }
            } else if self.func_pts_graph.pts(o).is_none() && inst.ty.is_pointer() {
                debug!("load: source obj not found in the graph: {}", idx);
            }
        }
        changed
    }

    fn transfer_store(&mut self, fref: FuncRef, value: &Operand, address: &Operand) -> bool {
        let is_pointer = {
            let module = self.ctx.program.module(fref.module);
            module.operand_is_pointer(module.func(fref.func), value)
        };
        if !is_pointer {
            return false;
        }

        let val_node = self.operand_value_node(fref, value);
        let ptr_node = self.operand_value_node(fref, address);
        match self.func_pts_graph.pts(val_node) {
            Some(set) if !set.is_empty() => {}
            _ => return false,
        }

        let mut changed = false;
        for idx in self.func_pts_graph.elems(ptr_node) {
            debug!("store: dst obj {}", idx);
            if self.ctx.node_factory.is_special_node(idx) {
                warn!("store: dst obj is a special node: {}", idx);
                continue;
            }
            let o = self.ctx.node_factory.canonical_object(idx);
            changed |= self.func_pts_graph.union_into(o, val_node) > 0;
        }
        changed
    }

    fn transfer_gep(
        &mut self,
        fref: FuncRef,
        inst: &Instruction,
        address: &Operand,
        source: &TypeRef,
        indices: &[GepIndex],
    ) -> bool {
        let ptr_node = self.operand_value_node(fref, address);
        let val_node = self.result_node(fref, inst);
        let elems = self.func_pts_graph.elems(ptr_node);
        if elems.is_empty() {
            return false;
        }

        let byte_offset = {
            let module = self.ctx.program.module(fref.module);
            gep_byte_offset(source, indices, module)
        };
        if byte_offset < 0 {
            // container_of style; no object model for negative offsets
            warn!(
                "GEP: {} negative offset: {}",
                self.inst_text(fref.module, inst),
                byte_offset
            );
            let mut changed = false;
            for idx in elems {
                if self.ctx.node_factory.is_special_node(idx) {
                    changed |= self.func_pts_graph.insert(val_node, idx);
                }
            }
            return changed;
        }

        let (field_num, src_struct) = {
            let ctx = &mut *self.ctx;
            let module = ctx.program.module(fref.module);
            let field =
                offset_to_field_num(source, byte_offset as u64, module, &mut ctx.struct_analyzer);
            let src_struct = ctx
                .struct_analyzer
                .get_struct_info(element_ty(source), module);
            (field, src_struct)
        };
        debug!("GEP field num: {}", field_num);

        let mut changed = false;
        for idx in elems {
            debug!("GEP source obj {}", idx);
            if self.ctx.node_factory.is_special_node(idx) {
                // null or universal, propagate unchanged
                changed |= self.func_pts_graph.insert(val_node, idx);
                continue;
            }

            let mut o = self.ctx.node_factory.canonical_object(idx);
            if let Some(si) = src_struct {
                let wanted = self.ctx.struct_analyzer.info(si).expanded_size();
                let alloc_size = self.ctx.node_factory.get_object_size(o);
                if wanted > alloc_size {
                    if self.ctx.node_factory.is_opaque_object(o) {
                        // the allocation size of an opaque object is unknown;
                        // grow it to the record the pointer claims
                        debug!("GEP resize obj: {} to {} fields", o, wanted);
                        debug_assert!(
                            self.ctx.node_factory.is_heap_object(o),
                            "non-heap object needs resize"
                        );
                        let ctx = &mut *self.ctx;
                        o = ctx.node_factory.extend_object_node(
                            o,
                            ctx.struct_analyzer.info(si),
                            &mut self.func_pts_graph,
                        );
                    } else {
                        // likely data passed as void*; without context
                        // sensitivity these cannot be told apart, so drop it
                        warn!("GEP non-opaque obj size mismatch: {} vs {} fields", o, wanted);
                        continue;
                    }
                }
            }

            let alloc_size = self.ctx.node_factory.get_object_size(o);
            let base = self.ctx.node_factory.base_of(o);
            let offset = self.ctx.node_factory.get_object_offset(o);
            let mut nidx = base.plus((offset + field_num) as usize);
            if offset + field_num >= alloc_size {
                // corner cases like records with variable-size trailing arrays
                warn!("GEP: field number {} out of bound ({})", nidx, alloc_size);
                nidx = base.plus(alloc_size as usize - 1);
            }
            changed |= self.func_pts_graph.insert(val_node, nidx);
        }
        changed
    }

    // ---- type-based fallback ----

    /// Candidate callees for an indirect site, by signature compatibility
    /// against every address-taken function.
    fn find_callees_by_type(
        &mut self,
        caller: FuncRef,
        inst: &Instruction,
        args: &[Operand],
    ) -> HashSet<FuncRef> {
        let ctx = &*self.ctx;
        let module = ctx.program.module(caller.module);
        let caller_func = module.func(caller.func);
        let ptr_bits = module.data_layout.pointer_size_bits;
        let actual_tys: Vec<TypeRef> = args
            .iter()
            .map(|op| operand_type(module, caller_func, op))
            .collect();

        let mut targets = HashSet::new();
        for &f in &ctx.address_taken_funcs {
            let func = ctx.program.func(f);
            if func.is_intrinsic() {
                continue;
            }
            if !func.is_var_arg && func.arg_size() != args.len() {
                continue;
            }
            if !is_compatible_type(&func.return_type, &inst.ty, ptr_bits) {
                continue;
            }
            // just compare known args
            let matched = func
                .params
                .iter()
                .zip(&actual_tys)
                .all(|(p, a)| is_compatible_type(&p.ty, a, ptr_bits));
            if matched {
                targets.insert(f);
            }
        }
        targets
    }

    // ---- type shortcuts ----

    /// For each record type used both as some function's return type and as
    /// some function's argument type, and owned by no global, collapse all
    /// those nodes onto one synthesized object. This keeps unrelated call
    /// chains through typed factory/accessor idioms from blowing up the
    /// points-to sets.
    fn create_type_shortcuts(&mut self) {
        let candidates: Vec<(StructInfoId, Vec<NodeIndex>)> = self
            .ret_structs
            .iter()
            .filter_map(|(si, ret_nodes)| {
                let arg_nodes = self.arg_structs.get(si)?;
                if self.global_structs.contains_key(si) {
                    return None;
                }
                let mut nodes: Vec<NodeIndex> = ret_nodes.iter().copied().collect();
                nodes.extend(arg_nodes.iter().copied());
                Some((*si, nodes))
            })
            .collect();

        for (si, nodes) in candidates {
            let obj = {
                let ctx = &mut *self.ctx;
                ctx.node_factory
                    .create_object_node(None, Some(ctx.struct_analyzer.info(si)), true)
            };
            debug!("type shortcut: {:?} -> {}", si, obj);
            self.type_shortcuts.insert(si, obj);
            for node in nodes {
                self.func_pts_graph.insert(node, obj);
                self.type_shortcuts_obj.insert(node);
                debug!("type shortcut: add {} -> {}", node, obj);
            }
        }
    }
}

fn operand_type(module: &Module, func: &Function, op: &Operand) -> TypeRef {
    match op {
        Operand::Local(l) => func.local_ty(*l).clone(),
        Operand::Global(g) => Type::ptr(module.global(*g).ty.clone()),
        Operand::Function(f) => Type::ptr(module.func(*f).fn_type()),
        Operand::Null | Operand::Undef => Type::ptr(Type::int(8)),
        Operand::Int(_) => Type::int(32),
    }
}

impl<'a> IterativeModulePass for CallGraphPass<'a> {
    const NAME: &'static str = "CallGraph";

    fn do_initialization(&mut self, mid: ModuleId) -> bool {
        let GlobalContext {
            program,
            funcs,
            ext_gobjs,
            address_taken_funcs,
            struct_analyzer: sa,
            node_factory: nf,
            entry_regex,
            ..
        } = &mut *self.ctx;
        let module = program.module(mid);

        // record globals for the shortcut veto
        for (g, global) in module.globals.iter().enumerate() {
            if ext_gobjs.contains_key(&global.guid()) {
                continue;
            }
            let gref = GlobalRef {
                module: mid,
                global: GlobalId(g as u32),
            };
            let elem = element_ty(&global.ty);
            if let Some(si) = sa.get_struct_info(elem, module) {
                debug!("record global {} : {:?}", global.name, si);
                if module.resolve_ty(elem).struct_name().is_none() {
                    warn!("global {} type is a literal record", global.name);
                }
                let val = nf.value_node(ValueRef::Global(gref));
                self.global_structs.entry(si).or_default().insert(val);
            }
        }

        for (f, func) in module.functions.iter().enumerate() {
            let fref = FuncRef {
                module: mid,
                func: FuncId(f as u32),
            };
            let rf = funcs.get(&func.guid()).copied().unwrap_or(fref);

            // collect address-taken functions
            if func.has_address_taken() {
                address_taken_funcs.insert(rf);
                let val = nf.create_value_node(ValueRef::Function(fref));
                let obj = nf.object_node(ValueRef::Function(rf));
                self.func_pts_graph.insert(val, obj);
                debug!("address taken: {} : {} -> {}", func.name, val, obj);
            }

            // entry seeds
            let is_entry = func.name == "main"
                || entry_regex
                    .as_ref()
                    .map_or(false, |re| re.is_match(&func.name));
            if is_entry && self.reachable.insert(rf) {
                self.unvisited.insert(rf);
            }

            // type shortcut candidates
            if let Some(pointee) = func.return_type.pointee() {
                if let Some(si) = sa.get_struct_info(pointee, module) {
                    let rt = nf.return_node(fref);
                    self.ret_structs.entry(si).or_default().insert(rt);
                }
            }
            if !func.is_declaration() {
                for (i, param) in func.params.iter().enumerate() {
                    if let Some(pointee) = param.ty.pointee() {
                        if let Some(si) = sa.get_struct_info(pointee, module) {
                            let arg = nf.value_node(ValueRef::Local {
                                func: fref,
                                local: LocalId(i as u32),
                            });
                            self.arg_structs.entry(si).or_default().insert(arg);
                        }
                    }
                }
            }
        }

        // initialize callers from direct users
        let mut direct_callers: Vec<(FuncRef, BaseCallSite)> = Vec::new();
        for (f, func) in module.functions.iter().enumerate() {
            let fref = FuncRef {
                module: mid,
                func: FuncId(f as u32),
            };
            for (loc, inst) in func.insts() {
                if let Some((Callee::Function(cid), _)) = inst.call_parts() {
                    let target = FuncRef {
                        module: mid,
                        func: *cid,
                    };
                    let rf = funcs
                        .get(&program.func(target).guid())
                        .copied()
                        .unwrap_or(target);
                    direct_callers.push((rf, BaseCallSite { func: fref, loc }));
                }
            }
        }
        let callers = &mut self.ctx.callers;
        for (callee, site) in direct_callers {
            callers.entry(callee).or_default().insert(site);
        }

        false
    }

    fn do_module_pass(&mut self, mid: ModuleId, iteration: u32) -> bool {
        // One-off: pick shortcut types once candidates from every module's
        // initialization are in.
        if self.type_shortcuts.is_empty() {
            self.create_type_shortcuts();
        }

        if iteration >= self.ctx.options.max_iterations {
            return false;
        }

        let mut changed = false;
        let num_funcs = self.ctx.program.module(mid).functions.len();
        for f in 0..num_funcs {
            let fref = FuncRef {
                module: mid,
                func: FuncId(f as u32),
            };
            let skip = {
                let func = self.ctx.program.func(fref);
                func.is_declaration() || func.is_intrinsic()
            };
            if skip {
                continue;
            }
            changed |= self.run_on_function(fref);
        }
        changed
    }

    fn do_finalization(&mut self, mid: ModuleId) -> bool {
        let num_funcs = self.ctx.program.module(mid).functions.len();
        for f in 0..num_funcs {
            let fref = FuncRef {
                module: mid,
                func: FuncId(f as u32),
            };
            let calls: Vec<(InstLoc, Instruction)> = self
                .ctx
                .program
                .func(fref)
                .insts()
                .filter(|(_, inst)| inst.is_call())
                .map(|(loc, inst)| (loc, inst.clone()))
                .collect();

            for (loc, inst) in calls {
                let (callee, args) = inst.call_parts().expect("not a call");
                if matches!(callee, Callee::InlineAsm) {
                    continue;
                }
                let site = BaseCallSite { func: fref, loc };

                // derive callers from the callee relation
                for cf in self.ctx.call_graph.get_callees(&site) {
                    self.ctx.callers.entry(cf).or_default().insert(site);
                }

                // recompute the type-based upper bound for indirect sites
                if matches!(callee, Callee::Pointer(_)) {
                    let targets = self.find_callees_by_type(fref, &inst, args);
                    self.callee_by_type.insert(site, targets);
                }
            }
        }
        false
    }
}
