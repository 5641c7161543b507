// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The analyzed program representation: typed, SSA-form, register-based IR
//! with explicit memory operations.
//!
//! Modules are self-contained; symbol identity across modules is by GUID, a
//! stable hash of the symbol name. Every SSA value of a function (parameters
//! first, then instruction results in program order) is a dense [`LocalId`].

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub mod builder;
pub mod layout;
pub mod loader;
pub mod types;

pub use layout::DataLayout;
pub use types::{element_ty, FloatKind, Type, TypeRef};

/// A name-derived identifier equating the same global symbol across modules.
pub type Guid = u64;

pub fn guid_of(name: &str) -> Guid {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

/// Module-local function index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Module-local global-variable index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalId(pub u32);

/// Function-local SSA value index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(pub u32);

/// A function pinned to its defining or declaring module.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncRef {
    pub module: ModuleId,
    pub func: FuncId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalRef {
    pub module: ModuleId,
    pub global: GlobalId,
}

/// Any IR entity that can own a value node in the points-to analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueRef {
    Local { func: FuncRef, local: LocalId },
    Global(GlobalRef),
    Function(FuncRef),
}

/// Position of an instruction inside its function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstLoc {
    pub block: u32,
    pub inst: u32,
}

/// A call or invoke instruction, identified by position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseCallSite {
    pub func: FuncRef,
    pub loc: InstLoc,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    External,
    Internal,
    Weak,
}

impl Default for Linkage {
    fn default() -> Self {
        Linkage::External
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Local(LocalId),
    Global(GlobalId),
    Function(FuncId),
    Null,
    Undef,
    Int(i64),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Callee {
    Function(FuncId),
    Pointer(Operand),
    InlineAsm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GepIndex {
    Const(i64),
    Value(Operand),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    Ret {
        value: Option<Operand>,
    },
    Br,
    Switch,
    Unreachable,
    Binary {
        lhs: Operand,
        rhs: Operand,
    },
    ICmp {
        lhs: Operand,
        rhs: Operand,
    },
    FCmp {
        lhs: Operand,
        rhs: Operand,
    },
    SExt {
        value: Operand,
    },
    ZExt {
        value: Operand,
    },
    Trunc {
        value: Operand,
    },
    Alloca {
        allocated: TypeRef,
    },
    Load {
        address: Operand,
    },
    Store {
        value: Operand,
        address: Operand,
    },
    Gep {
        address: Operand,
        source: TypeRef,
        indices: Vec<GepIndex>,
    },
    BitCast {
        value: Operand,
    },
    Phi {
        incoming: Vec<Operand>,
    },
    Select {
        cond: Operand,
        true_value: Operand,
        false_value: Operand,
    },
    Call {
        callee: Callee,
        args: Vec<Operand>,
    },
    Invoke {
        callee: Callee,
        args: Vec<Operand>,
    },
    PtrToInt {
        value: Operand,
    },
    IntToPtr {
        value: Operand,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default)]
    pub result: Option<LocalId>,
    pub ty: TypeRef,
    pub op: Opcode,
}

impl Instruction {
    /// The callee and argument list if this is a call or invoke.
    pub fn call_parts(&self) -> Option<(&Callee, &[Operand])> {
        match &self.op {
            Opcode::Call { callee, args } | Opcode::Invoke { callee, args } => {
                Some((callee, args.as_slice()))
            }
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        self.call_parts().is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Null,
    Zero,
    Int(i64),
    Function(FuncId),
    Global(GlobalId),
    Struct(Vec<Constant>),
    Array(Vec<Constant>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    #[serde(default)]
    pub linkage: Linkage,
    /// The type of the stored value (the global itself is a pointer to it).
    pub ty: TypeRef,
    #[serde(default)]
    pub initializer: Option<Constant>,
}

impl GlobalVariable {
    pub fn is_declaration(&self) -> bool {
        self.initializer.is_none()
    }

    pub fn guid(&self) -> Guid {
        guid_of(&self.name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: Option<String>,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BasicBlock {
    #[serde(default)]
    pub name: Option<String>,
    pub insts: Vec<Instruction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub linkage: Linkage,
    pub return_type: TypeRef,
    #[serde(default)]
    pub params: Vec<Parameter>,
    #[serde(default)]
    pub is_var_arg: bool,
    #[serde(default)]
    pub blocks: Vec<BasicBlock>,

    /// Type of every local, parameters first. Derived by `Module::finalize`.
    #[serde(skip)]
    pub(crate) locals: Vec<TypeRef>,
    /// Whether the function's address is used as a value anywhere in the
    /// module. Derived by `Module::finalize`.
    #[serde(skip)]
    pub(crate) address_taken: bool,
}

impl Function {
    pub fn guid(&self) -> Guid {
        guid_of(&self.name)
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_intrinsic(&self) -> bool {
        self.name.starts_with("llvm.")
    }

    pub fn has_address_taken(&self) -> bool {
        self.address_taken
    }

    pub fn arg_size(&self) -> usize {
        self.params.len()
    }

    pub fn local_ty(&self, local: LocalId) -> &TypeRef {
        &self.locals[local.0 as usize]
    }

    pub fn fn_type(&self) -> TypeRef {
        Type::func(
            self.return_type.clone(),
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.is_var_arg,
        )
    }

    /// Iterate all instructions in block order.
    pub fn insts(&self) -> impl Iterator<Item = (InstLoc, &Instruction)> {
        self.blocks.iter().enumerate().flat_map(|(b, block)| {
            block.insts.iter().enumerate().map(move |(i, inst)| {
                (
                    InstLoc {
                        block: b as u32,
                        inst: i as u32,
                    },
                    inst,
                )
            })
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub data_layout: DataLayout,
    /// Named record definitions, keyed by fully qualified name.
    #[serde(default)]
    pub named_types: std::collections::HashMap<String, TypeRef>,
    #[serde(default)]
    pub globals: Vec<GlobalVariable>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_string(),
            data_layout: DataLayout::default(),
            named_types: Default::default(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn named_type(&self, name: &str) -> Option<TypeRef> {
        self.named_types.get(name).cloned()
    }

    /// Resolves a by-name record reference to its definition; other types
    /// pass through.
    pub fn resolve_ty(&self, ty: &TypeRef) -> TypeRef {
        match ty.as_ref() {
            Type::Named { name } => self.named_type(name).unwrap_or_else(|| ty.clone()),
            _ => ty.clone(),
        }
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn global(&self, id: GlobalId) -> &GlobalVariable {
        &self.globals[id.0 as usize]
    }

    /// True when the operand can carry pointer information.
    pub fn operand_is_pointer(&self, func: &Function, op: &Operand) -> bool {
        match op {
            Operand::Local(l) => func.local_ty(*l).is_pointer(),
            Operand::Global(_) | Operand::Function(_) | Operand::Null => true,
            Operand::Undef | Operand::Int(_) => false,
        }
    }

    /// Derives the per-function local tables and address-taken flags.
    ///
    /// Result locals must be assigned densely in program order, parameters
    /// first; anything else indicates a malformed module.
    pub fn finalize(&mut self) -> Result<(), String> {
        let mut taken = vec![false; self.functions.len()];

        for func in &mut self.functions {
            let mut locals: Vec<TypeRef> = func.params.iter().map(|p| p.ty.clone()).collect();
            for block in &func.blocks {
                for inst in &block.insts {
                    if let Some(result) = inst.result {
                        if result.0 as usize != locals.len() {
                            return Err(format!(
                                "function {}: result local %{} out of order (expected %{})",
                                func.name,
                                result.0,
                                locals.len()
                            ));
                        }
                        locals.push(inst.ty.clone());
                    }
                }
            }
            func.locals = locals;
        }

        for func in &self.functions {
            for (_, inst) in func.insts() {
                let mut mark = |op: &Operand| {
                    if let Operand::Function(f) = op {
                        taken[f.0 as usize] = true;
                    }
                };
                match &inst.op {
                    // The direct-callee slot is not an address-taking use.
                    Opcode::Call { callee, args } | Opcode::Invoke { callee, args } => {
                        if let Callee::Pointer(op) = callee {
                            mark(op);
                        }
                        args.iter().for_each(&mut mark);
                    }
                    Opcode::Ret { value } => {
                        if let Some(op) = value {
                            mark(op);
                        }
                    }
                    Opcode::Store { value, address } => {
                        mark(value);
                        mark(address);
                    }
                    Opcode::Load { address } => mark(address),
                    Opcode::Gep { address, indices, .. } => {
                        mark(address);
                        for idx in indices {
                            if let GepIndex::Value(op) = idx {
                                mark(op);
                            }
                        }
                    }
                    Opcode::BitCast { value }
                    | Opcode::SExt { value }
                    | Opcode::ZExt { value }
                    | Opcode::Trunc { value }
                    | Opcode::PtrToInt { value }
                    | Opcode::IntToPtr { value } => mark(value),
                    Opcode::Phi { incoming } => incoming.iter().for_each(&mut mark),
                    Opcode::Select {
                        cond,
                        true_value,
                        false_value,
                    } => {
                        mark(cond);
                        mark(true_value);
                        mark(false_value);
                    }
                    Opcode::Binary { lhs, rhs }
                    | Opcode::ICmp { lhs, rhs }
                    | Opcode::FCmp { lhs, rhs } => {
                        mark(lhs);
                        mark(rhs);
                    }
                    Opcode::Alloca { .. }
                    | Opcode::Br
                    | Opcode::Switch
                    | Opcode::Unreachable => {}
                }
            }
        }

        fn mark_constant(c: &Constant, taken: &mut [bool]) {
            match c {
                Constant::Function(f) => taken[f.0 as usize] = true,
                Constant::Struct(elems) | Constant::Array(elems) => {
                    for e in elems {
                        mark_constant(e, taken);
                    }
                }
                _ => {}
            }
        }
        for global in &self.globals {
            if let Some(init) = &global.initializer {
                mark_constant(init, &mut taken);
            }
        }

        for (func, taken) in self.functions.iter_mut().zip(taken) {
            func.address_taken = taken;
        }
        Ok(())
    }
}

/// All loaded modules.
#[derive(Default)]
pub struct Program {
    pub modules: Vec<Module>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(module);
        id
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len() as u32).map(ModuleId)
    }

    pub fn func(&self, f: FuncRef) -> &Function {
        self.module(f.module).func(f.func)
    }

    pub fn global(&self, g: GlobalRef) -> &GlobalVariable {
        self.module(g.module).global(g.global)
    }

    pub fn func_name(&self, f: FuncRef) -> &str {
        &self.func(f).name
    }

    pub fn inst(&self, site: BaseCallSite) -> &Instruction {
        let func = self.func(site.func);
        &func.blocks[site.loc.block as usize].insts[site.loc.inst as usize]
    }

    pub fn iter_funcs(&self) -> impl Iterator<Item = (FuncRef, &Function)> {
        self.modules.iter().enumerate().flat_map(|(m, module)| {
            module.functions.iter().enumerate().map(move |(f, func)| {
                (
                    FuncRef {
                        module: ModuleId(m as u32),
                        func: FuncId(f as u32),
                    },
                    func,
                )
            })
        })
    }

    /// Find the defining function for a name, searching all modules.
    pub fn find_func(&self, name: &str) -> Option<FuncRef> {
        self.iter_funcs()
            .find(|(_, f)| f.name == name && !f.is_declaration())
            .map(|(r, _)| r)
            .or_else(|| {
                self.iter_funcs()
                    .find(|(_, f)| f.name == name)
                    .map(|(r, _)| r)
            })
    }
}

/// Renders an instruction roughly the way the textual IR would.
pub struct InstDisplay<'a> {
    pub inst: &'a Instruction,
    pub module: &'a Module,
}

impl<'a> InstDisplay<'a> {
    fn operand(&self, f: &mut fmt::Formatter<'_>, op: &Operand) -> fmt::Result {
        match op {
            Operand::Local(l) => write!(f, "%{}", l.0),
            Operand::Global(g) => write!(f, "@{}", self.module.global(*g).name),
            Operand::Function(id) => write!(f, "@{}", self.module.func(*id).name),
            Operand::Null => write!(f, "null"),
            Operand::Undef => write!(f, "undef"),
            Operand::Int(v) => write!(f, "{}", v),
        }
    }

    fn operands(&self, f: &mut fmt::Formatter<'_>, ops: &[Operand]) -> fmt::Result {
        for (i, op) in ops.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.operand(f, op)?;
        }
        Ok(())
    }
}

impl<'a> fmt::Display for InstDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.inst.result {
            write!(f, "%{} = ", result.0)?;
        }
        match &self.inst.op {
            Opcode::Ret { value: None } => write!(f, "ret void"),
            Opcode::Ret { value: Some(v) } => {
                write!(f, "ret ")?;
                self.operand(f, v)
            }
            Opcode::Br => write!(f, "br"),
            Opcode::Switch => write!(f, "switch"),
            Opcode::Unreachable => write!(f, "unreachable"),
            Opcode::Binary { lhs, rhs } => {
                write!(f, "binop ")?;
                self.operand(f, lhs)?;
                write!(f, ", ")?;
                self.operand(f, rhs)
            }
            Opcode::ICmp { lhs, rhs } => {
                write!(f, "icmp ")?;
                self.operand(f, lhs)?;
                write!(f, ", ")?;
                self.operand(f, rhs)
            }
            Opcode::FCmp { lhs, rhs } => {
                write!(f, "fcmp ")?;
                self.operand(f, lhs)?;
                write!(f, ", ")?;
                self.operand(f, rhs)
            }
            Opcode::SExt { value } => {
                write!(f, "sext ")?;
                self.operand(f, value)
            }
            Opcode::ZExt { value } => {
                write!(f, "zext ")?;
                self.operand(f, value)
            }
            Opcode::Trunc { value } => {
                write!(f, "trunc ")?;
                self.operand(f, value)
            }
            Opcode::Alloca { allocated } => write!(f, "alloca {}", allocated),
            Opcode::Load { address } => {
                write!(f, "load {}, ", self.inst.ty)?;
                self.operand(f, address)
            }
            Opcode::Store { value, address } => {
                write!(f, "store ")?;
                self.operand(f, value)?;
                write!(f, ", ")?;
                self.operand(f, address)
            }
            Opcode::Gep { address, source, .. } => {
                write!(f, "getelementptr {}, ", source)?;
                self.operand(f, address)
            }
            Opcode::BitCast { value } => {
                write!(f, "bitcast ")?;
                self.operand(f, value)?;
                write!(f, " to {}", self.inst.ty)
            }
            Opcode::Phi { incoming } => {
                write!(f, "phi ")?;
                self.operands(f, incoming)
            }
            Opcode::Select {
                cond,
                true_value,
                false_value,
            } => {
                write!(f, "select ")?;
                self.operand(f, cond)?;
                write!(f, ", ")?;
                self.operand(f, true_value)?;
                write!(f, ", ")?;
                self.operand(f, false_value)
            }
            Opcode::Call { callee, args } | Opcode::Invoke { callee, args } => {
                let kw = if matches!(self.inst.op, Opcode::Invoke { .. }) {
                    "invoke"
                } else {
                    "call"
                };
                match callee {
                    Callee::Function(id) => {
                        write!(f, "{} @{}(", kw, self.module.func(*id).name)?
                    }
                    Callee::Pointer(op) => {
                        write!(f, "{} ", kw)?;
                        self.operand(f, op)?;
                        write!(f, "(")?;
                    }
                    Callee::InlineAsm => write!(f, "{} asm(", kw)?,
                }
                self.operands(f, args)?;
                write!(f, ")")
            }
            Opcode::PtrToInt { value } => {
                write!(f, "ptrtoint ")?;
                self.operand(f, value)
            }
            Opcode::IntToPtr { value } => {
                write!(f, "inttoptr ")?;
                self.operand(f, value)
            }
        }
    }
}
