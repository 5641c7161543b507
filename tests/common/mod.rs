// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Shared helpers for the end-to-end call graph tests.

#![allow(dead_code)]

use std::collections::BTreeSet;

use ircg::ir::{BaseCallSite, FuncRef, Module, ModuleId, Program};
use ircg::pta::{CallGraphPass, GlobalContext, IterativeModulePass};
use ircg::util::options::AnalysisOptions;

/// Builds a program from the modules, runs the call graph pass to
/// completion, and hands the finished pass to the assertions.
pub fn analyze(modules: Vec<Module>, check: impl FnOnce(&mut CallGraphPass)) {
    analyze_with_options(modules, AnalysisOptions::default(), check)
}

pub fn analyze_with_options(
    modules: Vec<Module>,
    options: AnalysisOptions,
    check: impl FnOnce(&mut CallGraphPass),
) {
    let mut program = Program::new();
    for module in modules {
        program.add_module(module);
    }
    let module_ids: Vec<ModuleId> = program.module_ids().collect();
    let mut ctx = GlobalContext::new(program, options).expect("bad options");
    let mut pass = CallGraphPass::new(&mut ctx);
    pass.run(&module_ids);
    check(&mut pass);
}

pub fn func(pass: &CallGraphPass, name: &str) -> FuncRef {
    pass.ctx()
        .program
        .find_func(name)
        .unwrap_or_else(|| panic!("no function named {}", name))
}

pub fn reachable_names(pass: &CallGraphPass) -> BTreeSet<String> {
    pass.reachable()
        .iter()
        .map(|f| pass.ctx().program.func_name(*f).to_string())
        .collect()
}

/// For every call site in `caller`, in program order, the set of resolved
/// callee names.
pub fn call_sites_in(pass: &CallGraphPass, caller: &str) -> Vec<BTreeSet<String>> {
    let ctx = pass.ctx();
    let fref = func(pass, caller);
    ctx.program
        .func(fref)
        .insts()
        .filter(|(_, inst)| inst.is_call())
        .map(|(loc, _)| {
            let site = BaseCallSite { func: fref, loc };
            ctx.call_graph
                .get_callees(&site)
                .into_iter()
                .map(|f| ctx.program.func_name(f).to_string())
                .collect()
        })
        .collect()
}

/// Names of the functions whose bodies contain a call site targeting `callee`.
pub fn caller_names(pass: &CallGraphPass, callee: &str) -> BTreeSet<String> {
    let ctx = pass.ctx();
    let fref = func(pass, callee);
    ctx.callers
        .get(&fref)
        .map(|sites| {
            sites
                .iter()
                .map(|site| ctx.program.func_name(site.func).to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
