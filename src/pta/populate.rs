// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Factory population: walks every module once, creating the nodes the
//! transfer functions will assert on, and seeding the global-init points-to
//! graph (special nodes, globals, stack and known-allocator heap objects).

use log::debug;

use crate::ir::{
    element_ty, Callee, FuncRef, GlobalId, GlobalRef, LocalId, Opcode, ValueRef,
};

use super::node_factory::{NULL_OBJ, NULL_PTR, UNIVERSAL_OBJ, UNIVERSAL_PTR};
use super::GlobalContext;

pub fn populate_node_factory(ctx: &mut GlobalContext) {
    let GlobalContext {
        program,
        struct_analyzer: sa,
        node_factory: nf,
        funcs,
        gobjs,
        ext_gobjs,
        global_init_pts_graph: pts,
        ..
    } = ctx;

    // The universal pointer may point anywhere, modeled as the universal
    // object pointing to itself. The null pointer points to the null object.
    pts.insert(UNIVERSAL_PTR, UNIVERSAL_OBJ);
    pts.insert(UNIVERSAL_OBJ, UNIVERSAL_OBJ);
    pts.insert(NULL_PTR, NULL_OBJ);

    // Globals: an object group per defining symbol (or per sole declaration),
    // expanded by the element record type with arrays collapsed.
    for mid in program.module_ids() {
        let module = program.module(mid);
        for (g, global) in module.globals.iter().enumerate() {
            let gref = GlobalRef {
                module: mid,
                global: GlobalId(g as u32),
            };
            nf.create_value_node(ValueRef::Global(gref));

            let guid = global.guid();
            let canonical = gobjs
                .get(&guid)
                .or_else(|| ext_gobjs.get(&guid))
                .copied()
                .unwrap_or(gref);
            if canonical != gref {
                continue;
            }
            let elem = element_ty(&global.ty);
            let layout = sa
                .get_struct_info(elem, module)
                .map(|id| sa.info(id).clone());
            let obj = nf.create_object_node(Some(ValueRef::Global(gref)), layout.as_ref(), false);
            debug!("global {}: object group at {}", global.name, obj);
        }
    }

    // Declarations resolve to the defining module's object.
    for mid in program.module_ids() {
        let module = program.module(mid);
        for (g, global) in module.globals.iter().enumerate() {
            let gref = GlobalRef {
                module: mid,
                global: GlobalId(g as u32),
            };
            let guid = global.guid();
            let target = gobjs
                .get(&guid)
                .or_else(|| ext_gobjs.get(&guid))
                .copied()
                .unwrap_or(gref);
            let obj = nf.object_node(ValueRef::Global(target));
            let val = nf.value_node(ValueRef::Global(gref));
            pts.insert(val, obj);
        }
    }

    // Functions: value nodes for all, return/vararg nodes per signature,
    // locals for bodies, stack objects per alloca, opaque heap objects at
    // calls to declared allocators.
    let all_funcs: Vec<FuncRef> = program.iter_funcs().map(|(f, _)| f).collect();
    for fref in all_funcs {
        let module = program.module(fref.module);
        let func = module.func(fref.func);

        nf.create_value_node(ValueRef::Function(fref));
        if !func.return_type.is_void() {
            nf.create_return_node(fref);
        }
        if func.is_var_arg {
            nf.create_vararg_node(fref);
        }

        if func.has_address_taken() {
            let canonical = funcs.get(&func.guid()).copied().unwrap_or(fref);
            nf.create_object_node(Some(ValueRef::Function(canonical)), None, false);
        }

        if func.is_declaration() {
            continue;
        }

        for i in 0..func.locals.len() {
            nf.create_value_node(ValueRef::Local {
                func: fref,
                local: LocalId(i as u32),
            });
        }

        for (_, inst) in func.insts() {
            match &inst.op {
                Opcode::Alloca { allocated } => {
                    let result = inst.result.expect("alloca without result");
                    let site = ValueRef::Local {
                        func: fref,
                        local: result,
                    };
                    let elem = element_ty(allocated);
                    let layout = sa
                        .get_struct_info(elem, module)
                        .map(|id| sa.info(id).clone());
                    let obj = nf.create_object_node(Some(site), layout.as_ref(), false);
                    pts.insert(nf.value_node(site), obj);
                }
                Opcode::Call {
                    callee: Callee::Function(callee),
                    ..
                }
                | Opcode::Invoke {
                    callee: Callee::Function(callee),
                    ..
                } => {
                    let target = module.func(*callee);
                    if target.is_declaration()
                        && !target.is_intrinsic()
                        && target.name.contains("alloc")
                        && inst.ty.is_pointer()
                    {
                        let result = inst.result.expect("pointer call without result");
                        let site = ValueRef::Local {
                            func: fref,
                            local: result,
                        };
                        let obj = nf.create_opaque_object_node(site, true);
                        debug!(
                            "allocation site {} in {}: heap object {}",
                            target.name, func.name, obj
                        );
                        pts.insert(nf.value_node(site), obj);
                    }
                }
                _ => {}
            }
        }
    }
}
