// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Dumps analysis results: the resolved callee relation for indirect call
//! sites, the caller relation, and the call graph in DOT form.

use std::io::{self, Write};

use itertools::Itertools;
use log::{debug, info};

use crate::ir::{BaseCallSite, Callee, InstDisplay};
use crate::pta::CallGraphPass;

/// One line per (indirect call site, callee). Sites that stayed empty are
/// reported afterwards with their type-based candidates.
pub fn dump_callees(pass: &CallGraphPass, out: &mut dyn Write) -> io::Result<()> {
    let ctx = pass.ctx();
    debug!("[dump callees]");

    let mut empty_sites: Vec<BaseCallSite> = Vec::new();

    for (fref, func) in ctx.program.iter_funcs() {
        if func.is_declaration() {
            continue;
        }
        let module = ctx.program.module(fref.module);
        for (loc, inst) in func.insts() {
            let Some((callee, _)) = inst.call_parts() else {
                continue;
            };
            // only indirect calls are dumped
            match callee {
                Callee::InlineAsm | Callee::Function(_) => continue,
                Callee::Pointer(_) => {}
            }
            let site = BaseCallSite { func: fref, loc };
            let callees = ctx.call_graph.get_callees(&site);
            if callees.is_empty() {
                empty_sites.push(site);
                continue;
            }
            let prefix = format!("<{}>{}::", module.name, func.name);
            let text = InstDisplay { inst, module }.to_string();
            let mut names: Vec<&str> =
                callees.iter().map(|f| ctx.program.func_name(*f)).collect();
            names.sort_unstable();
            for name in names {
                writeln!(out, "{}{}\t{}", prefix, text, name)?;
            }
        }
    }

    debug!("[empty callees: {}]", empty_sites.len());
    for site in empty_sites {
        if !pass.reachable().contains(&site.func) {
            continue;
        }
        let module = ctx.program.module(site.func.module);
        let inst = ctx.program.inst(site);
        writeln!(
            out,
            "!!EMPTY =>{} @@{}",
            InstDisplay { inst, module },
            ctx.program.func_name(site.func)
        )?;
        if let Some(targets) = pass.callee_by_type().get(&site) {
            if !targets.is_empty() {
                let names = targets
                    .iter()
                    .map(|f| ctx.program.func_name(*f))
                    .sorted_unstable()
                    .join(" ");
                writeln!(out, "TypeMatch: {}", names)?;
            }
        }
    }
    Ok(())
}

/// The caller relation, one function per stanza.
pub fn dump_callers(pass: &CallGraphPass, out: &mut dyn Write) -> io::Result<()> {
    let ctx = pass.ctx();
    debug!("[dump callers]");

    let funcs = ctx
        .callers
        .keys()
        .sorted_by_key(|f| ctx.program.func_name(**f));
    for func in funcs {
        writeln!(out, "F : {}", ctx.program.func_name(*func))?;
        let sites = ctx.callers[func].iter().sorted();
        for site in sites {
            let module = ctx.program.module(site.func.module);
            let inst = ctx.program.inst(*site);
            writeln!(
                out,
                "\t({}) {}",
                ctx.program.func_name(site.func),
                InstDisplay { inst, module }
            )?;
        }
    }
    Ok(())
}

/// Writes whatever the options ask for.
pub fn dump_results(pass: &CallGraphPass) -> io::Result<()> {
    let options = &pass.ctx().options;

    let mut out: Box<dyn Write> = match &options.output {
        Some(path) => Box::new(io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    dump_callees(pass, &mut out)?;
    out.flush()?;

    if options.dump_callers {
        let mut err = io::stderr().lock();
        dump_callers(pass, &mut err)?;
    }

    if let Some(dot_path) = &options.dump_call_graph {
        info!("dumping call graph to {}", dot_path.display());
        pass.ctx()
            .call_graph
            .to_dot(&pass.ctx().program, dot_path)?;
    }
    Ok(())
}
