// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Target data layout: byte sizes, alignment and record field offsets.
//!
//! Natural alignment only; packed records are not modeled.

use serde::{Deserialize, Serialize};

use super::types::{FloatKind, Type, TypeRef};
use super::Module;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataLayout {
    pub pointer_size_bits: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        DataLayout {
            pointer_size_bits: 64,
        }
    }
}

impl DataLayout {
    pub fn pointer_bytes(&self) -> u64 {
        (self.pointer_size_bits / 8) as u64
    }

    /// Allocation size in bytes, padding included.
    pub fn size_of(&self, ty: &TypeRef, module: &Module) -> u64 {
        match ty.as_ref() {
            Type::Void => 0,
            Type::Integer { bits } => int_bytes(*bits),
            Type::Float { kind } => float_bytes(*kind),
            Type::Pointer { .. } => self.pointer_bytes(),
            Type::Array { elem, len } | Type::Vector { elem, len } => {
                self.size_of(elem, module) * len
            }
            Type::Struct { fields, .. } => {
                if ty.is_union() {
                    fields
                        .iter()
                        .map(|f| self.size_of(f, module))
                        .max()
                        .unwrap_or(0)
                } else {
                    let (_, size) = self.struct_layout(fields, module);
                    size
                }
            }
            Type::Named { name } => match module.named_type(name) {
                Some(def) => self.size_of(&def, module),
                None => 0,
            },
            Type::Func { .. } => 0,
        }
    }

    pub fn align_of(&self, ty: &TypeRef, module: &Module) -> u64 {
        match ty.as_ref() {
            Type::Void => 1,
            Type::Integer { bits } => int_bytes(*bits).max(1),
            Type::Float { kind } => float_bytes(*kind),
            Type::Pointer { .. } => self.pointer_bytes(),
            Type::Array { elem, .. } | Type::Vector { elem, .. } => self.align_of(elem, module),
            Type::Struct { fields, .. } => fields
                .iter()
                .map(|f| self.align_of(f, module))
                .max()
                .unwrap_or(1),
            Type::Named { name } => match module.named_type(name) {
                Some(def) => self.align_of(&def, module),
                None => 1,
            },
            Type::Func { .. } => 1,
        }
    }

    /// Byte offsets of each field plus the padded total size.
    pub fn struct_layout(&self, fields: &[TypeRef], module: &Module) -> (Vec<u64>, u64) {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0u64;
        let mut max_align = 1u64;
        for field in fields {
            let align = self.align_of(field, module).max(1);
            max_align = max_align.max(align);
            offset = align_to(offset, align);
            offsets.push(offset);
            offset += self.size_of(field, module);
        }
        (offsets, align_to(offset, max_align))
    }
}

fn int_bytes(bits: u32) -> u64 {
    let bytes = (bits as u64 + 7) / 8;
    bytes.next_power_of_two()
}

fn float_bytes(kind: FloatKind) -> u64 {
    match kind {
        FloatKind::Half => 2,
        FloatKind::Float => 4,
        FloatKind::Double => 8,
        FloatKind::Fp128 => 16,
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    (offset + align - 1) / align * align
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::Module;

    #[test]
    fn scalar_sizes() {
        let dl = DataLayout::default();
        let m = Module::new("t");
        assert_eq!(dl.size_of(&Type::int(1), &m), 1);
        assert_eq!(dl.size_of(&Type::int(32), &m), 4);
        assert_eq!(dl.size_of(&Type::ptr(Type::int(8)), &m), 8);
        assert_eq!(dl.size_of(&Type::array(Type::int(32), 10), &m), 40);
    }

    #[test]
    fn struct_offsets_respect_alignment() {
        let dl = DataLayout::default();
        let m = Module::new("t");
        // { i8, i64, i32 } -> offsets 0, 8, 16; size 24
        let fields = vec![Type::int(8), Type::int(64), Type::int(32)];
        let (offsets, size) = dl.struct_layout(&fields, &m);
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(size, 24);
    }

    #[test]
    fn union_size_is_max_of_fields() {
        let dl = DataLayout::default();
        let m = Module::new("t");
        let u = Type::named_struct("union.u", vec![Type::int(32), Type::int(64)]);
        assert_eq!(dl.size_of(&u, &m), 8);
    }
}
