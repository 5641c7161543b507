// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Analysis options.

use std::path::PathBuf;

/// Whole-program call graph construction for IR modules.
#[derive(Clone, Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct AnalysisOptions {
    /// Input IR module files.
    #[arg(required = true)]
    pub modules: Vec<PathBuf>,

    /// Verbose level (0 = warnings, 1 = info, 2 = debug, 3 = trace).
    #[arg(short, long, default_value_t = 0)]
    pub verbose: u32,

    /// Extra entry-point symbols, as a regex over function names.
    /// `main` is always an entry.
    #[arg(long)]
    pub entry_pattern: Option<String>,

    /// Bound on propagation sweeps over all modules. Raising it trades
    /// runtime for precision on deep wrapper chains.
    #[arg(long, default_value_t = 2)]
    pub max_iterations: u32,

    /// Write the resolved callee relation here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also dump the caller relation.
    #[arg(long)]
    pub dump_callers: bool,

    /// Dump the call graph in DOT format to this file.
    #[arg(long)]
    pub dump_call_graph: Option<PathBuf>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            modules: Vec::new(),
            verbose: 0,
            entry_pattern: None,
            max_iterations: 2,
            output: None,
            dump_callers: false,
            dump_call_graph: None,
        }
    }
}
