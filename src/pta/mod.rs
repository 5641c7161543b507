// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Shared analysis state and the iterative module-pass driver.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use regex::Regex;

use crate::graph::call_graph::CallGraph;
use crate::ir::{BaseCallSite, FuncRef, GlobalRef, Guid, ModuleId, Program};
use crate::pts_set::points_to::PointsToSet;
use crate::struct_analyzer::StructAnalyzer;
use crate::util::options::AnalysisOptions;

pub mod call_graph_pass;
pub mod node_factory;
pub mod populate;

pub use call_graph_pass::CallGraphPass;
pub use node_factory::{NodeFactory, NodeIndex};

pub type PointsTo = PointsToSet<NodeIndex>;

/// `NodeIndex -> PointsToSet`, read-empty, write-auto-create.
///
/// Mutated monotonically: nothing is ever removed within one run.
#[derive(Clone, Default)]
pub struct PtsGraph {
    map: HashMap<NodeIndex, PointsTo>,
}

impl PtsGraph {
    pub fn new() -> Self {
        PtsGraph::default()
    }

    pub fn pts(&self, node: NodeIndex) -> Option<&PointsTo> {
        self.map.get(&node)
    }

    pub fn pts_mut(&mut self, node: NodeIndex) -> &mut PointsTo {
        self.map.entry(node).or_default()
    }

    pub fn insert(&mut self, node: NodeIndex, elem: NodeIndex) -> bool {
        self.pts_mut(node).insert(elem)
    }

    /// Unions `pts(src)` into `pts(dst)`; returns how many elements were new.
    pub fn union_into(&mut self, dst: NodeIndex, src: NodeIndex) -> usize {
        if dst == src {
            return 0;
        }
        let src_set = match self.map.get(&src) {
            Some(set) if !set.is_empty() => set.clone(),
            _ => return 0,
        };
        self.pts_mut(dst).union(&src_set)
    }

    pub fn union_set(&mut self, dst: NodeIndex, set: &PointsTo) -> usize {
        self.pts_mut(dst).union(set)
    }

    /// Snapshot of the elements at `node`, for iteration while the graph is
    /// being grown.
    pub fn elems(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.map
            .get(&node)
            .map(|set| set.iter().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeIndex, &PointsTo)> {
        self.map.iter()
    }
}

/// Global information of the analysis, shared by every pass.
pub struct GlobalContext {
    pub options: AnalysisOptions,
    pub program: Program,

    pub struct_analyzer: StructAnalyzer,
    pub node_factory: NodeFactory,

    /// Map global function GUID to the function definition.
    pub funcs: HashMap<Guid, FuncRef>,
    /// Map external function GUID to a single declaration.
    pub ext_funcs: HashMap<Guid, FuncRef>,
    /// Map global object GUID to the object definition.
    pub gobjs: HashMap<Guid, GlobalRef>,
    /// Map external global object GUID to a single declaration.
    pub ext_gobjs: HashMap<Guid, GlobalRef>,

    /// Functions whose addresses are taken, canonicalized to definitions.
    pub address_taken_funcs: HashSet<FuncRef>,

    /// Map a callsite to all potential callee functions.
    pub call_graph: CallGraph,
    /// Map a function to all potential caller instructions.
    pub callers: HashMap<FuncRef, HashSet<BaseCallSite>>,

    /// Global init points-to graph, the seed state for each analysis.
    pub global_init_pts_graph: PtsGraph,

    pub(crate) entry_regex: Option<Regex>,
}

impl GlobalContext {
    pub fn new(program: Program, options: AnalysisOptions) -> Result<Self, regex::Error> {
        let entry_regex = match &options.entry_pattern {
            Some(pattern) => Some(Regex::new(pattern)?),
            None => None,
        };
        let mut ctx = GlobalContext {
            options,
            program,
            struct_analyzer: StructAnalyzer::new(),
            node_factory: NodeFactory::new(),
            funcs: HashMap::new(),
            ext_funcs: HashMap::new(),
            gobjs: HashMap::new(),
            ext_gobjs: HashMap::new(),
            address_taken_funcs: HashSet::new(),
            call_graph: CallGraph::new(),
            callers: HashMap::new(),
            global_init_pts_graph: PtsGraph::new(),
            entry_regex,
        };
        ctx.register_symbols();
        populate::populate_node_factory(&mut ctx);
        Ok(ctx)
    }

    /// Collects externally linked definitions and declarations by GUID.
    fn register_symbols(&mut self) {
        for mid in self.program.module_ids() {
            let module = self.program.module(mid);

            for (g, global) in module.globals.iter().enumerate() {
                if global.linkage != crate::ir::Linkage::External {
                    continue;
                }
                let gref = GlobalRef {
                    module: mid,
                    global: crate::ir::GlobalId(g as u32),
                };
                let guid = global.guid();
                if !global.is_declaration() {
                    if self.gobjs.insert(guid, gref).is_some() {
                        warn!("duplicate definition of global {}", global.name);
                    }
                } else {
                    self.ext_gobjs.entry(guid).or_insert(gref);
                }
            }

            for (f, func) in module.functions.iter().enumerate() {
                if func.linkage != crate::ir::Linkage::External {
                    continue;
                }
                let fref = FuncRef {
                    module: mid,
                    func: crate::ir::FuncId(f as u32),
                };
                let guid = func.guid();
                if !func.is_declaration() {
                    if self.funcs.insert(guid, fref).is_some() {
                        warn!("duplicate definition of function {}", func.name);
                    }
                } else {
                    self.ext_funcs.entry(guid).or_insert(fref);
                }
            }
        }

        // clear declarations that turned out to be defined somewhere
        for guid in self.gobjs.keys() {
            self.ext_gobjs.remove(guid);
        }
        for guid in self.funcs.keys() {
            self.ext_funcs.remove(guid);
        }
    }

    /// Canonicalizes a function reference to its defining module's function.
    pub fn get_func_def(&self, f: FuncRef) -> FuncRef {
        let guid = self.program.func(f).guid();
        self.funcs.get(&guid).copied().unwrap_or(f)
    }

    pub fn is_entry(&self, name: &str) -> bool {
        name == "main"
            || self
                .entry_regex
                .as_ref()
                .map_or(false, |re| re.is_match(name))
    }
}

/// An analysis run over all modules: an initialization sweep repeated until
/// quiescent, a propagation sweep repeated until a full pass reports no
/// change, and a finalization sweep repeated until quiescent.
pub trait IterativeModulePass {
    const NAME: &'static str;

    /// Run on each module before the iterative passes.
    fn do_initialization(&mut self, module: ModuleId) -> bool;

    /// One propagation pass over a module. `iteration` counts full sweeps.
    fn do_module_pass(&mut self, module: ModuleId, iteration: u32) -> bool;

    /// Run on each module after the iterative passes.
    fn do_finalization(&mut self, module: ModuleId) -> bool;

    fn run(&mut self, modules: &[ModuleId]) {
        info!("[{}] initializing {} modules", Self::NAME, modules.len());
        let mut again = true;
        while again {
            again = false;
            for &m in modules {
                again |= self.do_initialization(m);
            }
        }

        let mut iteration = 0;
        loop {
            let mut changed = 0u32;
            for &m in modules {
                debug!("[{} / {}] module {:?}", Self::NAME, iteration, m);
                if self.do_module_pass(m, iteration) {
                    changed += 1;
                }
            }
            info!("[{}] updated in {} modules", Self::NAME, changed);
            iteration += 1;
            if changed == 0 {
                break;
            }
        }

        info!("[{}] postprocessing", Self::NAME);
        again = true;
        while again {
            again = false;
            for &m in modules {
                again |= self.do_finalization(m);
            }
        }
        info!("[{}] done", Self::NAME);
    }
}
