// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The main routine of `ircg`: load the IR modules named on the command
//! line, run the call graph pass over all of them, and dump the resolved
//! callee relation.

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info, LevelFilter};

use ircg::ir::{loader, ModuleId, Program};
use ircg::pta::{CallGraphPass, GlobalContext, IterativeModulePass};
use ircg::util::options::AnalysisOptions;
use ircg::util::results_dumper;

fn init_logger(verbose: u32) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env(env_logger::Env::new().filter("IRCG_LOG"))
        .init();
}

fn main() -> ExitCode {
    let options = AnalysisOptions::parse();
    init_logger(options.verbose);

    info!("total {} file(s)", options.modules.len());
    let mut program = Program::new();
    for path in &options.modules {
        info!("input filename: {}", path.display());
        match loader::load_module(path) {
            Ok(module) => {
                program.add_module(module);
            }
            Err(e) => {
                // report and keep going with the remaining files
                eprintln!("error loading file '{}': {}", path.display(), e);
                continue;
            }
        }
    }

    let module_ids: Vec<ModuleId> = program.module_ids().collect();
    let mut ctx = match GlobalContext::new(program, options) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("bad entry pattern: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let now = Instant::now();
    let mut pass = CallGraphPass::new(&mut ctx);
    pass.run(&module_ids);
    info!(
        "analysis time: {}",
        humantime::format_duration(now.elapsed())
    );

    if let Err(e) = results_dumper::dump_results(&pass) {
        error!("failed to dump results: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
