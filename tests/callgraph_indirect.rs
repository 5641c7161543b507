// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Indirect-call resolution through the points-to relation.

mod common;

use common::*;

use ircg::ir::builder::ModuleBuilder;
use ircg::ir::{Constant, GepIndex, Operand, Type, TypeRef, ValueRef};
use ircg::util::results_dumper;

fn fnptr_i32() -> TypeRef {
    Type::ptr(Type::func(Type::int(32), vec![], false))
}

/// fp = cond ? target1 : target2; indirect_call(fp) invokes fp().
#[test]
fn indirect_via_ternary() {
    let mut mb = ModuleBuilder::new("ternary");
    let i32t = Type::int(32);
    let fp_ty = fnptr_i32();
    let t1 = mb.declare_function("target1", i32t.clone(), &[], false);
    let t2 = mb.declare_function("target2", i32t.clone(), &[], false);
    let call_fp = mb.declare_function("indirect_call", i32t.clone(), &[fp_ty.clone()], false);
    let main = mb.declare_function("main", i32t.clone(), &[], false);

    for f in [t1, t2] {
        let mut b = mb.body(f);
        b.ret(Operand::Int(0));
        mb.set_body(b);
    }

    let mut b = mb.body(call_fp);
    let r = b.call_indirect(i32t.clone(), b.param(0), vec![]).unwrap();
    b.ret(Operand::Local(r));
    mb.set_body(b);

    let mut b = mb.body(main);
    let cond = b.icmp(Operand::Int(1), Operand::Int(0));
    let fp = b.select(
        fp_ty.clone(),
        Operand::Local(cond),
        Operand::Function(t1),
        Operand::Function(t2),
    );
    let r = b
        .call(i32t.clone(), call_fp, vec![Operand::Local(fp)])
        .unwrap();
    b.ret(Operand::Local(r));
    mb.set_body(b);

    analyze(vec![mb.build()], |pass| {
        assert_eq!(
            reachable_names(pass),
            names(&["main", "indirect_call", "target1", "target2"])
        );
        assert_eq!(
            call_sites_in(pass, "indirect_call"),
            vec![names(&["target1", "target2"])]
        );
        // both targets record the internal site as a caller
        assert_eq!(caller_names(pass, "target1"), names(&["indirect_call"]));
        assert_eq!(caller_names(pass, "target2"), names(&["indirect_call"]));
    });
}

#[test]
fn indirect_via_phi() {
    let mut mb = ModuleBuilder::new("phi");
    let i32t = Type::int(32);
    let fp_ty = fnptr_i32();
    let t1 = mb.declare_function("left", i32t.clone(), &[], false);
    let t2 = mb.declare_function("right", i32t.clone(), &[], false);
    let main = mb.declare_function("main", i32t.clone(), &[], false);

    for f in [t1, t2] {
        let mut b = mb.body(f);
        b.ret(Operand::Int(0));
        mb.set_body(b);
    }

    let mut b = mb.body(main);
    b.br();
    b.block();
    let fp = b.phi(fp_ty.clone(), vec![Operand::Function(t1), Operand::Function(t2)]);
    let r = b.call_indirect(i32t.clone(), Operand::Local(fp), vec![]).unwrap();
    b.ret(Operand::Local(r));
    mb.set_body(b);

    analyze(vec![mb.build()], |pass| {
        assert_eq!(call_sites_in(pass, "main"), vec![names(&["left", "right"])]);
        assert_eq!(reachable_names(pass), names(&["main", "left", "right"]));
    });
}

/// For every address-taken f: valueNode(f) points to objectNode(f), and the
/// object resolves back to f.
#[test]
fn address_taken_seeding_round_trips() {
    let mut mb = ModuleBuilder::new("seeding");
    let i32t = Type::int(32);
    let fp_ty = fnptr_i32();
    let taken = mb.declare_function("taken", i32t.clone(), &[], false);
    let main = mb.declare_function("main", i32t.clone(), &[], false);

    let mut b = mb.body(taken);
    b.ret(Operand::Int(0));
    mb.set_body(b);

    let mut b = mb.body(main);
    let slot = b.alloca(fp_ty.clone());
    b.store(Operand::Function(taken), Operand::Local(slot));
    b.ret(Operand::Int(0));
    mb.set_body(b);

    analyze(vec![mb.build()], |pass| {
        let ctx = pass.ctx();
        let taken_ref = func(pass, "taken");
        assert!(ctx.address_taken_funcs.contains(&taken_ref));

        let val = ctx.node_factory.value_node(ValueRef::Function(taken_ref));
        let obj = ctx.node_factory.object_node(ValueRef::Function(taken_ref));
        assert!(pass.pts_graph().pts(val).unwrap().contains(obj));
        assert_eq!(
            ctx.node_factory.get_value_for_node(obj),
            Some(ValueRef::Function(taken_ref))
        );
        assert!(ctx.node_factory.is_object_node(obj));
        assert!(!ctx.node_factory.is_heap_object(obj));
    });
}

/// A function pointer parked in a global record field: register() stores it,
/// dispatch() loads and calls it.
#[test]
fn function_pointer_through_global_record_field() {
    let mut mb = ModuleBuilder::new("registry");
    let i32t = Type::int(32);
    let i64t = Type::int(64);
    let void = Type::void();
    let fp_ty = fnptr_i32();
    let handler_ty = mb.define_named_type(
        "struct.handler",
        vec![i64t.clone(), Type::ptr(Type::func(i32t.clone(), vec![], false))],
    );
    let slots = mb.add_global("handler", handler_ty.clone(), Some(Constant::Zero));

    let imp = mb.declare_function("handler_impl", i32t.clone(), &[], false);
    let register = mb.declare_function("register_handler", void.clone(), &[fp_ty.clone()], false);
    let dispatch = mb.declare_function("dispatch", i32t.clone(), &[], false);
    let main = mb.declare_function("main", i32t.clone(), &[], false);

    let mut b = mb.body(imp);
    b.ret(Operand::Int(0));
    mb.set_body(b);

    let mut b = mb.body(register);
    let field = b.gep(
        Type::ptr(fp_ty.clone()),
        handler_ty.clone(),
        Operand::Global(slots),
        vec![GepIndex::Const(0), GepIndex::Const(1)],
    );
    b.store(b.param(0), Operand::Local(field));
    b.ret_void();
    mb.set_body(b);

    let mut b = mb.body(dispatch);
    let field = b.gep(
        Type::ptr(fp_ty.clone()),
        handler_ty.clone(),
        Operand::Global(slots),
        vec![GepIndex::Const(0), GepIndex::Const(1)],
    );
    let fp = b.load(fp_ty.clone(), Operand::Local(field));
    let r = b.call_indirect(i32t.clone(), Operand::Local(fp), vec![]).unwrap();
    b.ret(Operand::Local(r));
    mb.set_body(b);

    let mut b = mb.body(main);
    let _ = b.call(void.clone(), register, vec![Operand::Function(imp)]);
    let r = b.call(i32t.clone(), dispatch, vec![]).unwrap();
    b.ret(Operand::Local(r));
    mb.set_body(b);

    analyze(vec![mb.build()], |pass| {
        assert_eq!(
            call_sites_in(pass, "dispatch")[0],
            names(&["handler_impl"])
        );
        assert!(reachable_names(pass).contains("handler_impl"));
        assert_eq!(caller_names(pass, "handler_impl"), names(&["dispatch"]));
    });
}

/// An indirect site whose callee operand never gains a points-to set falls
/// back to type matching and shows up as !!EMPTY in the dump.
#[test]
fn empty_indirect_site_uses_type_fallback() {
    let mut mb = ModuleBuilder::new("fallback");
    let i32t = Type::int(32);
    let void = Type::void();
    let fp_ty = Type::ptr(Type::func(i32t.clone(), vec![i32t.clone()], false));

    // the pointer comes from an external global nothing ever stores to
    let ext_fp = mb.add_global("ext_fp", fp_ty.clone(), None);

    let compat = mb.declare_function("compat_target", i32t.clone(), &[i32t.clone()], false);
    let incompat = mb.declare_function("incompat_target", void.clone(), &[fp_ty.clone()], false);
    let keeper = mb.declare_function("keeper", void.clone(), &[], false);
    let main = mb.declare_function("main", i32t.clone(), &[], false);

    let mut b = mb.body(compat);
    b.ret(b.param(0));
    mb.set_body(b);

    let mut b = mb.body(incompat);
    b.ret_void();
    mb.set_body(b);

    // take both targets' addresses so they are fallback candidates
    let mut b = mb.body(keeper);
    let s1 = b.alloca(fp_ty.clone());
    b.store(Operand::Function(compat), Operand::Local(s1));
    let s2 = b.alloca(fp_ty.clone());
    b.store(Operand::Function(incompat), Operand::Local(s2));
    b.ret_void();
    mb.set_body(b);

    let mut b = mb.body(main);
    let fp = b.load(fp_ty.clone(), Operand::Global(ext_fp));
    let r = b
        .call_indirect(i32t.clone(), Operand::Local(fp), vec![Operand::Int(5)])
        .unwrap();
    b.ret(Operand::Local(r));
    mb.set_body(b);

    analyze(vec![mb.build()], |pass| {
        // unresolved, with a type-based upper bound of exactly compat_target
        assert_eq!(pass.callee_by_type().len(), 1);
        let targets = pass.callee_by_type().values().next().unwrap();
        let target_names: Vec<&str> = targets
            .iter()
            .map(|f| pass.ctx().program.func_name(*f))
            .collect();
        assert_eq!(target_names, vec!["compat_target"]);
        assert_eq!(pass.unresolved_fpts().len(), 1);

        let mut out = Vec::new();
        results_dumper::dump_callees(pass, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("!!EMPTY"), "dump was: {}", text);
        assert!(text.contains("@@main"), "dump was: {}", text);
        assert!(text.contains("TypeMatch: compat_target"), "dump was: {}", text);
    });
}

/// Direct calls resolve through GUIDs to the defining module's function, and
/// stores in one module are visible to loads in another.
#[test]
fn cross_module_resolution() {
    let i32t = Type::int(32);
    let fp_ty = fnptr_i32();

    // module a: declares foo and the shared global, calls through both
    let mut a = ModuleBuilder::new("a");
    let g_decl = a.add_global("shared_fp", fp_ty.clone(), None);
    let foo_decl = a.declare_function("foo", i32t.clone(), &[], false);
    let main = a.declare_function("main", i32t.clone(), &[], false);
    let mut b = a.body(main);
    let _ = b.call(i32t.clone(), foo_decl, vec![]);
    let fp = b.load(fp_ty.clone(), Operand::Global(g_decl));
    let r = b.call_indirect(i32t.clone(), Operand::Local(fp), vec![]).unwrap();
    b.ret(Operand::Local(r));
    a.set_body(b);

    // module b: defines foo, the global, and the stored target
    let mut bm = ModuleBuilder::new("b");
    let g_def = bm.add_global("shared_fp", fp_ty.clone(), Some(Constant::Null));
    let stored = bm.declare_function("stored_target", i32t.clone(), &[], false);
    let foo = bm.declare_function("foo", i32t.clone(), &[], false);
    let mut fb = bm.body(stored);
    fb.ret(Operand::Int(0));
    bm.set_body(fb);
    let mut fb = bm.body(foo);
    fb.store(Operand::Function(stored), Operand::Global(g_def));
    fb.ret(Operand::Int(0));
    bm.set_body(fb);

    analyze(vec![a.build(), bm.build()], |pass| {
        // the direct call resolved to the definition in module b
        let foo_def = func(pass, "foo");
        assert!(!pass.ctx().program.func(foo_def).is_declaration());
        assert!(pass.reachable().contains(&foo_def));

        // the store through module b's definition reaches module a's load
        assert_eq!(
            call_sites_in(pass, "main"),
            vec![names(&["foo"]), names(&["stored_target"])]
        );
        assert!(reachable_names(pass).contains("stored_target"));
    });
}
