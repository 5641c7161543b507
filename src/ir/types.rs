// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The IR type system.
//!
//! Record types come in two flavors, mirroring the usual IR distinction:
//! *literal* records (`name == None`) are identified structurally, *named*
//! records are identified by their fully qualified name and referenced
//! elsewhere through [`Type::Named`], resolved via the owning module's type
//! table. A named record whose name starts with `union.` is a union: all of
//! its storage overlaps and it collapses to a single primitive slot.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub type TypeRef = Rc<Type>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatKind {
    Half,
    Float,
    Double,
    Fp128,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Void,
    Integer {
        bits: u32,
    },
    Float {
        kind: FloatKind,
    },
    Pointer {
        pointee: TypeRef,
    },
    Array {
        elem: TypeRef,
        len: u64,
    },
    Vector {
        elem: TypeRef,
        len: u64,
    },
    /// A record type. Literal when `name` is `None`, a named definition
    /// otherwise (definitions live in `Module::named_types`).
    Struct {
        name: Option<String>,
        fields: Vec<TypeRef>,
    },
    /// A by-name reference to a record defined in the module's type table.
    Named {
        name: String,
    },
    Func {
        ret: TypeRef,
        params: Vec<TypeRef>,
        var_arg: bool,
    },
}

impl Type {
    pub fn void() -> TypeRef {
        Rc::new(Type::Void)
    }

    pub fn int(bits: u32) -> TypeRef {
        Rc::new(Type::Integer { bits })
    }

    pub fn float(kind: FloatKind) -> TypeRef {
        Rc::new(Type::Float { kind })
    }

    pub fn ptr(pointee: TypeRef) -> TypeRef {
        Rc::new(Type::Pointer { pointee })
    }

    pub fn array(elem: TypeRef, len: u64) -> TypeRef {
        Rc::new(Type::Array { elem, len })
    }

    pub fn vector(elem: TypeRef, len: u64) -> TypeRef {
        Rc::new(Type::Vector { elem, len })
    }

    pub fn literal_struct(fields: Vec<TypeRef>) -> TypeRef {
        Rc::new(Type::Struct { name: None, fields })
    }

    pub fn named_struct(name: &str, fields: Vec<TypeRef>) -> TypeRef {
        Rc::new(Type::Struct {
            name: Some(name.to_string()),
            fields,
        })
    }

    pub fn named(name: &str) -> TypeRef {
        Rc::new(Type::Named {
            name: name.to_string(),
        })
    }

    pub fn func(ret: TypeRef, params: Vec<TypeRef>, var_arg: bool) -> TypeRef {
        Rc::new(Type::Func { ret, params, var_arg })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn pointee(&self) -> Option<&TypeRef> {
        match self {
            Type::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    /// True for both literal records and by-name record references.
    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct { .. } | Type::Named { .. })
    }

    /// The record name, if this is a named record or a reference to one.
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Type::Struct { name, .. } => name.as_deref(),
            Type::Named { name } => Some(name),
            _ => None,
        }
    }

    /// Unions are Clang-style records named `union.*`.
    pub fn is_union(&self) -> bool {
        self.struct_name().map_or(false, |n| n.starts_with("union."))
    }
}

/// Strips arrays and vectors down to their scalar element, to a fixed point.
pub fn element_ty(ty: &TypeRef) -> &TypeRef {
    let mut ty = ty;
    loop {
        match ty.as_ref() {
            Type::Array { elem, .. } | Type::Vector { elem, .. } => ty = elem,
            _ => return ty,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Integer { bits } => write!(f, "i{}", bits),
            Type::Float { kind } => match kind {
                FloatKind::Half => write!(f, "half"),
                FloatKind::Float => write!(f, "float"),
                FloatKind::Double => write!(f, "double"),
                FloatKind::Fp128 => write!(f, "fp128"),
            },
            Type::Pointer { pointee } => write!(f, "{}*", pointee),
            Type::Array { elem, len } => write!(f, "[{} x {}]", len, elem),
            Type::Vector { elem, len } => write!(f, "<{} x {}>", len, elem),
            Type::Struct { name: Some(name), .. } | Type::Named { name } => {
                write!(f, "%{}", name)
            }
            Type::Struct { name: None, fields } => {
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")
            }
            Type::Func { ret, params, var_arg } => {
                write!(f, "{} (", ret)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                if *var_arg {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn element_ty_unwraps_nested_aggregates() {
        let scalar = Type::int(8);
        let nested = Type::array(Type::vector(Type::array(scalar.clone(), 4), 2), 8);
        assert_eq!(element_ty(&nested), &scalar);
        assert_eq!(element_ty(&scalar), &scalar);
    }

    #[test]
    fn union_detection_by_name() {
        let u = Type::named_struct("union.u", vec![Type::int(32), Type::int(64)]);
        let s = Type::named_struct("struct.s", vec![Type::int(32)]);
        assert!(u.is_union());
        assert!(!s.is_union());
        assert!(Type::named("union.u").is_union());
    }

    #[test]
    fn display_is_llvm_like() {
        let ty = Type::ptr(Type::named("struct.foo"));
        assert_eq!(ty.to_string(), "%struct.foo*");
        let fnty = Type::func(Type::void(), vec![Type::int(32)], true);
        assert_eq!(fnty.to_string(), "void (i32, ...)");
    }
}
