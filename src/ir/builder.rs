// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Programmatic module construction.
//!
//! Functions are declared first (so call sites can reference them, including
//! self-recursively) and given bodies afterwards. Result locals are assigned
//! automatically in program order, parameters first, which is exactly the
//! numbering `Module::finalize` expects.

use super::types::{Type, TypeRef};
use super::{
    BasicBlock, Callee, Constant, DataLayout, FuncId, Function, GepIndex, GlobalId,
    GlobalVariable, Instruction, Linkage, LocalId, Module, Opcode, Operand, Parameter,
};

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: &str) -> Self {
        ModuleBuilder {
            module: Module::new(name),
        }
    }

    pub fn set_data_layout(&mut self, layout: DataLayout) {
        self.module.data_layout = layout;
    }

    /// Registers a named record definition and returns a by-name reference.
    pub fn define_named_type(&mut self, name: &str, fields: Vec<TypeRef>) -> TypeRef {
        self.module
            .named_types
            .insert(name.to_string(), Type::named_struct(name, fields));
        Type::named(name)
    }

    pub fn add_global(
        &mut self,
        name: &str,
        ty: TypeRef,
        initializer: Option<Constant>,
    ) -> GlobalId {
        let id = GlobalId(self.module.globals.len() as u32);
        self.module.globals.push(GlobalVariable {
            name: name.to_string(),
            linkage: Linkage::External,
            ty,
            initializer,
        });
        id
    }

    /// Declares a function signature with no body.
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: TypeRef,
        params: &[TypeRef],
        is_var_arg: bool,
    ) -> FuncId {
        let id = FuncId(self.module.functions.len() as u32);
        self.module.functions.push(Function {
            name: name.to_string(),
            linkage: Linkage::External,
            return_type,
            params: params
                .iter()
                .map(|ty| Parameter {
                    name: None,
                    ty: ty.clone(),
                })
                .collect(),
            is_var_arg,
            blocks: Vec::new(),
            locals: Vec::new(),
            address_taken: false,
        });
        id
    }

    pub fn set_linkage(&mut self, func: FuncId, linkage: Linkage) {
        self.module.functions[func.0 as usize].linkage = linkage;
    }

    /// Starts a body for a previously declared function.
    pub fn body(&self, func: FuncId) -> FunctionBuilder {
        let f = &self.module.functions[func.0 as usize];
        assert!(f.blocks.is_empty(), "function {} already has a body", f.name);
        FunctionBuilder {
            func,
            next_local: f.params.len() as u32,
            blocks: vec![BasicBlock::default()],
        }
    }

    pub fn set_body(&mut self, fb: FunctionBuilder) {
        self.module.functions[fb.func.0 as usize].blocks = fb.blocks;
    }

    pub fn build(mut self) -> Module {
        self.module
            .finalize()
            .expect("builder produced a malformed module");
        self.module
    }
}

pub struct FunctionBuilder {
    func: FuncId,
    next_local: u32,
    blocks: Vec<BasicBlock>,
}

impl FunctionBuilder {
    pub fn param(&self, i: u32) -> Operand {
        Operand::Local(LocalId(i))
    }

    /// Starts a new basic block; subsequent instructions land there.
    pub fn block(&mut self) {
        self.blocks.push(BasicBlock::default());
    }

    fn push(&mut self, ty: TypeRef, op: Opcode, has_result: bool) -> Option<LocalId> {
        let result = if has_result {
            let id = LocalId(self.next_local);
            self.next_local += 1;
            Some(id)
        } else {
            None
        };
        self.blocks
            .last_mut()
            .expect("no current block")
            .insts
            .push(Instruction { result, ty, op });
        result
    }

    pub fn alloca(&mut self, allocated: TypeRef) -> LocalId {
        let ty = Type::ptr(allocated.clone());
        self.push(ty, Opcode::Alloca { allocated }, true).unwrap()
    }

    pub fn load(&mut self, ty: TypeRef, address: Operand) -> LocalId {
        self.push(ty, Opcode::Load { address }, true).unwrap()
    }

    pub fn store(&mut self, value: Operand, address: Operand) {
        self.push(Type::void(), Opcode::Store { value, address }, false);
    }

    pub fn gep(
        &mut self,
        ty: TypeRef,
        source: TypeRef,
        address: Operand,
        indices: Vec<GepIndex>,
    ) -> LocalId {
        self.push(
            ty,
            Opcode::Gep {
                address,
                source,
                indices,
            },
            true,
        )
        .unwrap()
    }

    pub fn bitcast(&mut self, ty: TypeRef, value: Operand) -> LocalId {
        self.push(ty, Opcode::BitCast { value }, true).unwrap()
    }

    pub fn phi(&mut self, ty: TypeRef, incoming: Vec<Operand>) -> LocalId {
        self.push(ty, Opcode::Phi { incoming }, true).unwrap()
    }

    pub fn select(
        &mut self,
        ty: TypeRef,
        cond: Operand,
        true_value: Operand,
        false_value: Operand,
    ) -> LocalId {
        self.push(
            ty,
            Opcode::Select {
                cond,
                true_value,
                false_value,
            },
            true,
        )
        .unwrap()
    }

    /// A direct call. Returns the result local for non-void callees.
    pub fn call(&mut self, ret: TypeRef, callee: FuncId, args: Vec<Operand>) -> Option<LocalId> {
        let has_result = !ret.is_void();
        self.push(
            ret,
            Opcode::Call {
                callee: Callee::Function(callee),
                args,
            },
            has_result,
        )
    }

    /// An indirect call through a function pointer operand.
    pub fn call_indirect(
        &mut self,
        ret: TypeRef,
        pointer: Operand,
        args: Vec<Operand>,
    ) -> Option<LocalId> {
        let has_result = !ret.is_void();
        self.push(
            ret,
            Opcode::Call {
                callee: Callee::Pointer(pointer),
                args,
            },
            has_result,
        )
    }

    pub fn call_asm(&mut self, args: Vec<Operand>) {
        self.push(
            Type::void(),
            Opcode::Call {
                callee: Callee::InlineAsm,
                args,
            },
            false,
        );
    }

    pub fn icmp(&mut self, lhs: Operand, rhs: Operand) -> LocalId {
        self.push(Type::int(1), Opcode::ICmp { lhs, rhs }, true).unwrap()
    }

    pub fn binary(&mut self, ty: TypeRef, lhs: Operand, rhs: Operand) -> LocalId {
        self.push(ty, Opcode::Binary { lhs, rhs }, true).unwrap()
    }

    pub fn sext(&mut self, ty: TypeRef, value: Operand) -> LocalId {
        self.push(ty, Opcode::SExt { value }, true).unwrap()
    }

    pub fn ptr_to_int(&mut self, ty: TypeRef, value: Operand) -> LocalId {
        self.push(ty, Opcode::PtrToInt { value }, true).unwrap()
    }

    pub fn ret(&mut self, value: Operand) {
        self.push(Type::void(), Opcode::Ret { value: Some(value) }, false);
    }

    pub fn ret_void(&mut self) {
        self.push(Type::void(), Opcode::Ret { value: None }, false);
    }

    pub fn br(&mut self) {
        self.push(Type::void(), Opcode::Br, false);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn locals_are_dense_in_program_order() {
        let mut mb = ModuleBuilder::new("m");
        let i32t = Type::int(32);
        let f = mb.declare_function("f", i32t.clone(), &[i32t.clone()], false);
        let mut b = mb.body(f);
        let slot = b.alloca(i32t.clone()); // %1
        b.store(b.param(0), Operand::Local(slot));
        let v = b.load(i32t.clone(), Operand::Local(slot)); // %2
        b.ret(Operand::Local(v));
        mb.set_body(b);
        let module = mb.build();

        let func = module.func(f);
        assert_eq!(func.locals.len(), 3);
        assert!(func.local_ty(slot).is_pointer());
        assert_eq!(func.local_ty(v), &Type::int(32));
    }

    #[test]
    fn address_taken_is_computed() {
        let mut mb = ModuleBuilder::new("m");
        let void = Type::void();
        let callee = mb.declare_function("callee", void.clone(), &[], false);
        let stored = mb.declare_function("stored", void.clone(), &[], false);
        let main = mb.declare_function("main", Type::int(32), &[], false);
        let mut b = mb.body(main);
        let fp_ty = Type::ptr(Type::func(void.clone(), vec![], false));
        let slot = b.alloca(fp_ty.clone());
        b.store(Operand::Function(stored), Operand::Local(slot));
        let _ = b.call(void.clone(), callee, vec![]);
        b.ret(Operand::Int(0));
        mb.set_body(b);
        let module = mb.build();

        assert!(!module.func(callee).has_address_taken());
        assert!(module.func(stored).has_address_taken());
    }
}
