// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The struct layout oracle.
//!
//! For every record type the analyzer produces its *expanded* layout: the
//! number of primitive field slots after recursively flattening nested
//! records and collapsing arrays, with a union flag per slot. Object-node
//! groups in the points-to analysis are sized by expanded layouts, so field
//! addressing can be plain index arithmetic off a group base.
//!
//! Identity: named records are equated by fully qualified name (across
//! modules), literal records structurally.

use std::collections::HashMap;

use log::warn;

use crate::ir::{GepIndex, Module, Type, TypeRef};

const MAX_EXPANSION_DEPTH: u32 = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructInfoId(u32);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum StructKey {
    Named(String),
    Literal(Vec<TypeRef>),
}

#[derive(Clone, Debug)]
pub struct StructInfo {
    /// The resolved record definition.
    real_type: TypeRef,
    /// Primitive slots after flattening; at least 1.
    expanded_size: u32,
    /// Union flag per expanded slot.
    field_is_union: Vec<bool>,
    /// Expanded slot index of each original field.
    field_expanded_offsets: Vec<u32>,
    /// Byte offset of each original field.
    field_byte_offsets: Vec<u64>,
}

impl StructInfo {
    pub fn real_type(&self) -> &TypeRef {
        &self.real_type
    }

    pub fn expanded_size(&self) -> u32 {
        self.expanded_size
    }

    pub fn is_field_union(&self, i: u32) -> bool {
        self.field_is_union.get(i as usize).copied().unwrap_or(false)
    }

    pub fn field_expanded_offset(&self, field: usize) -> u32 {
        self.field_expanded_offsets[field]
    }

    pub fn field_byte_offset(&self, field: usize) -> u64 {
        self.field_byte_offsets[field]
    }
}

#[derive(Default)]
pub struct StructAnalyzer {
    infos: Vec<StructInfo>,
    by_key: HashMap<StructKey, StructInfoId>,
}

impl StructAnalyzer {
    pub fn new() -> Self {
        StructAnalyzer::default()
    }

    pub fn info(&self, id: StructInfoId) -> &StructInfo {
        &self.infos[id.0 as usize]
    }

    /// Returns the layout of `ty` if it is (or names) a record type.
    pub fn get_struct_info(&mut self, ty: &TypeRef, module: &Module) -> Option<StructInfoId> {
        let resolved = module.resolve_ty(ty);
        let (name, fields) = match resolved.as_ref() {
            Type::Struct { name, fields } => (name.clone(), fields.clone()),
            _ => return None,
        };

        let key = match &name {
            Some(n) => StructKey::Named(n.clone()),
            None => StructKey::Literal(fields.clone()),
        };
        if let Some(id) = self.by_key.get(&key) {
            return Some(*id);
        }

        let info = self.compute(&resolved, &fields, module);
        let id = StructInfoId(self.infos.len() as u32);
        self.infos.push(info);
        self.by_key.insert(key, id);
        Some(id)
    }

    fn compute(&mut self, real_type: &TypeRef, fields: &[TypeRef], module: &Module) -> StructInfo {
        let mut flags = Vec::new();
        let mut field_expanded_offsets = Vec::with_capacity(fields.len());

        if real_type.is_union() {
            // A union is a single overlapping slot; every field maps to it.
            flags.push(true);
            field_expanded_offsets.resize(fields.len(), 0);
        } else {
            for field in fields {
                field_expanded_offsets.push(flags.len() as u32);
                expand_type(field, module, &mut flags, 0);
            }
        }
        if flags.is_empty() {
            flags.push(false);
        }

        let field_byte_offsets = if real_type.is_union() {
            vec![0; fields.len()]
        } else {
            module.data_layout.struct_layout(fields, module).0
        };

        StructInfo {
            real_type: real_type.clone(),
            expanded_size: flags.len() as u32,
            field_is_union: flags,
            field_expanded_offsets,
            field_byte_offsets,
        }
    }
}

fn expand_type(ty: &TypeRef, module: &Module, flags: &mut Vec<bool>, depth: u32) {
    if depth > MAX_EXPANSION_DEPTH {
        warn!("record expansion exceeds depth limit, truncating at {}", ty);
        flags.push(false);
        return;
    }
    let resolved = module.resolve_ty(ty);
    match resolved.as_ref() {
        Type::Struct { fields, .. } => {
            if resolved.is_union() {
                flags.push(true);
            } else {
                for field in fields {
                    expand_type(field, module, flags, depth + 1);
                }
            }
        }
        Type::Array { elem, .. } | Type::Vector { elem, .. } => {
            // Arrays collapse onto their element.
            expand_type(elem, module, flags, depth + 1);
        }
        _ => flags.push(false),
    }
}

/// Maps a byte offset into `ty` to the expanded field slot it lands in.
pub fn offset_to_field_num(
    ty: &TypeRef,
    byte_offset: u64,
    module: &Module,
    analyzer: &mut StructAnalyzer,
) -> u32 {
    let layout = &module.data_layout;
    let mut ty = module.resolve_ty(ty);
    let mut off = byte_offset;
    let mut field = 0u32;

    for _ in 0..MAX_EXPANSION_DEPTH {
        if ty.is_union() {
            break;
        }
        match ty.clone().as_ref() {
            Type::Array { elem, .. } | Type::Vector { elem, .. } => {
                let stride = layout.size_of(elem, module);
                if stride == 0 {
                    break;
                }
                off %= stride;
                ty = module.resolve_ty(elem);
            }
            Type::Struct { fields, .. } => {
                if fields.is_empty() {
                    break;
                }
                let id = match analyzer.get_struct_info(&ty, module) {
                    Some(id) => id,
                    None => break,
                };
                let (idx, expanded, byte) = {
                    let info = analyzer.info(id);
                    let idx = last_field_at_or_before(&info.field_byte_offsets, off);
                    (
                        idx,
                        info.field_expanded_offsets[idx],
                        info.field_byte_offsets[idx],
                    )
                };
                field += expanded;
                off -= byte;
                ty = module.resolve_ty(&fields[idx]);
            }
            _ => break,
        }
    }
    field
}

fn last_field_at_or_before(offsets: &[u64], off: u64) -> usize {
    match offsets.partition_point(|&o| o <= off) {
        0 => 0,
        n => n - 1,
    }
}

/// Evaluates the constant byte offset of a GEP. Non-constant indices step
/// through arrays with an unknown value and contribute zero, which is sound
/// under array collapsing.
pub fn gep_byte_offset(source: &TypeRef, indices: &[GepIndex], module: &Module) -> i64 {
    let layout = &module.data_layout;
    let mut offset: i64 = 0;
    let mut iter = indices.iter();

    // The first index steps over whole source elements.
    if let Some(GepIndex::Const(v)) = iter.next() {
        offset += v * layout.size_of(source, module) as i64;
    }

    let mut ty = module.resolve_ty(source);
    for idx in iter {
        match ty.clone().as_ref() {
            Type::Struct { fields, .. } => {
                let k = match idx {
                    GepIndex::Const(k) => *k,
                    GepIndex::Value(_) => {
                        warn!("non-constant record index in GEP, treating as field 0");
                        0
                    }
                };
                let k = k.clamp(0, fields.len().saturating_sub(1) as i64) as usize;
                if fields.is_empty() {
                    break;
                }
                if !ty.is_union() {
                    let (offsets, _) = layout.struct_layout(fields, module);
                    offset += offsets[k] as i64;
                }
                ty = module.resolve_ty(&fields[k]);
            }
            Type::Array { elem, .. } | Type::Vector { elem, .. } => {
                if let GepIndex::Const(v) = idx {
                    offset += v * layout.size_of(elem, module) as i64;
                }
                ty = module.resolve_ty(elem);
            }
            _ => break,
        }
    }
    offset
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::builder::ModuleBuilder;
    use crate::ir::Type;

    fn module_with_types() -> Module {
        let mut mb = ModuleBuilder::new("t");
        // struct inner { i32; i8* }
        mb.define_named_type("struct.inner", vec![Type::int(32), Type::ptr(Type::int(8))]);
        // struct outer { i64; struct inner; [4 x i32] }
        mb.define_named_type(
            "struct.outer",
            vec![
                Type::int(64),
                Type::named("struct.inner"),
                Type::array(Type::int(32), 4),
            ],
        );
        mb.define_named_type("union.u", vec![Type::int(64), Type::ptr(Type::int(8))]);
        mb.build()
    }

    #[test]
    fn expansion_flattens_and_collapses() {
        let module = module_with_types();
        let mut sa = StructAnalyzer::new();

        let inner = sa
            .get_struct_info(&Type::named("struct.inner"), &module)
            .unwrap();
        assert_eq!(sa.info(inner).expanded_size(), 2);

        // outer = i64 + (i32, i8*) + collapsed array = 4 slots
        let outer = sa
            .get_struct_info(&Type::named("struct.outer"), &module)
            .unwrap();
        let info = sa.info(outer);
        assert_eq!(info.expanded_size(), 4);
        assert_eq!(info.field_expanded_offset(0), 0);
        assert_eq!(info.field_expanded_offset(1), 1);
        assert_eq!(info.field_expanded_offset(2), 3);
        assert!(!info.is_field_union(0));
    }

    #[test]
    fn unions_collapse_to_one_flagged_slot() {
        let module = module_with_types();
        let mut sa = StructAnalyzer::new();
        let u = sa.get_struct_info(&Type::named("union.u"), &module).unwrap();
        let info = sa.info(u);
        assert_eq!(info.expanded_size(), 1);
        assert!(info.is_field_union(0));
    }

    #[test]
    fn named_identity_is_shared() {
        let module = module_with_types();
        let mut sa = StructAnalyzer::new();
        let a = sa.get_struct_info(&Type::named("struct.inner"), &module).unwrap();
        let b = sa
            .get_struct_info(&module.named_type("struct.inner").unwrap(), &module)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn offset_maps_into_nested_fields() {
        let module = module_with_types();
        let mut sa = StructAnalyzer::new();
        let outer = Type::named("struct.outer");

        // struct.outer layout: i64 at 0, inner at 8 (i32 at 8, i8* at 16), array at 24.
        assert_eq!(offset_to_field_num(&outer, 0, &module, &mut sa), 0);
        assert_eq!(offset_to_field_num(&outer, 8, &module, &mut sa), 1);
        assert_eq!(offset_to_field_num(&outer, 16, &module, &mut sa), 2);
        assert_eq!(offset_to_field_num(&outer, 24, &module, &mut sa), 3);
        // Anywhere inside the collapsed array is the same slot.
        assert_eq!(offset_to_field_num(&outer, 32, &module, &mut sa), 3);
    }

    #[test]
    fn gep_offsets_follow_the_layout() {
        let module = module_with_types();
        let outer = Type::named("struct.outer");

        // gep outer, 0, 1, 1 -> inner.ptr at byte 16
        let off = gep_byte_offset(
            &outer,
            &[
                GepIndex::Const(0),
                GepIndex::Const(1),
                GepIndex::Const(1),
            ],
            &module,
        );
        assert_eq!(off, 16);

        // negative first index, container_of style
        let off = gep_byte_offset(&outer, &[GepIndex::Const(-1)], &module);
        assert!(off < 0);
    }
}
