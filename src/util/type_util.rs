// Copyright (c) 2026 the ircg developers.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Type compatibility for type-based callee matching.
//!
//! Deliberately permissive: two functions are a potential indirect-call pair
//! when a cast between their signatures could plausibly be written in C.
//! Integers of any width match each other; an integer matches a pointer when
//! it is pointer-wide; `i8*` matches any pointer; named records match by
//! name, literal records by content.

use crate::ir::{Type, TypeRef};

pub fn is_compatible_type(t1: &TypeRef, t2: &TypeRef, ptr_bits: u32) -> bool {
    if t1 == t2 {
        return true;
    }
    if t1.is_struct() && t2.is_struct() {
        return match (t1.struct_name(), t2.struct_name()) {
            // Named records are equated by name only.
            (Some(n1), Some(n2)) => n1 == n2,
            // Literal records by content.
            (None, None) => match (t1.as_ref(), t2.as_ref()) {
                (Type::Struct { fields: f1, .. }, Type::Struct { fields: f2, .. }) => {
                    f1.len() == f2.len()
                        && f1
                            .iter()
                            .zip(f2)
                            .all(|(a, b)| is_compatible_type(a, b, ptr_bits))
                }
                _ => false,
            },
            _ => false,
        };
    }
    match (t1.as_ref(), t2.as_ref()) {
        (Type::Void, _) | (_, Type::Void) => false,
        (Type::Integer { .. }, Type::Integer { .. }) => true,
        // A pointer-wide integer casts to and from a pointer.
        (Type::Integer { bits }, Type::Pointer { .. })
        | (Type::Pointer { .. }, Type::Integer { bits }) => *bits == ptr_bits,
        (Type::Pointer { pointee: p1 }, Type::Pointer { pointee: p2 }) => {
            if is_i8(p1) || is_i8(p2) {
                return true;
            }
            is_compatible_type(p1, p2, ptr_bits)
        }
        (Type::Array { elem: e1, .. }, Type::Array { elem: e2, .. }) => {
            is_compatible_type(e1, e2, ptr_bits)
        }
        (
            Type::Func {
                ret: r1,
                params: p1,
                var_arg: v1,
            },
            Type::Func {
                ret: r2,
                params: p2,
                var_arg: v2,
            },
        ) => {
            if !is_compatible_type(r1, r2, ptr_bits) {
                return false;
            }
            if *v1 {
                return *v2;
            }
            p1.len() == p2.len()
                && p1
                    .iter()
                    .zip(p2)
                    .all(|(a, b)| is_compatible_type(a, b, ptr_bits))
        }
        (Type::Float { kind: k1 }, Type::Float { kind: k2 }) => k1 == k2,
        _ => false,
    }
}



fn is_i8(ty: &TypeRef) -> bool {
    matches!(ty.as_ref(), Type::Integer { bits: 8 })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::FloatKind;

    const PTR_BITS: u32 = 64;

    fn compat(a: &TypeRef, b: &TypeRef) -> bool {
        is_compatible_type(a, b, PTR_BITS)
    }

    #[test]
    fn reflexive_and_symmetric() {
        let samples = vec![
            Type::void(),
            Type::int(1),
            Type::int(32),
            Type::int(64),
            Type::float(FloatKind::Double),
            Type::ptr(Type::int(8)),
            Type::ptr(Type::int(32)),
            Type::ptr(Type::named("struct.a")),
            Type::array(Type::int(32), 4),
            Type::named("struct.a"),
            Type::named("struct.b"),
            Type::literal_struct(vec![Type::int(32), Type::ptr(Type::int(8))]),
            Type::func(Type::int(32), vec![Type::int(32)], false),
        ];
        for a in &samples {
            assert!(compat(a, a), "not reflexive: {}", a);
            for b in &samples {
                assert_eq!(compat(a, b), compat(b, a), "asymmetric: {} vs {}", a, b);
            }
        }
    }

    #[test]
    fn integers_of_any_width_match() {
        assert!(compat(&Type::int(8), &Type::int(64)));
        assert!(!compat(&Type::int(32), &Type::float(FloatKind::Float)));
    }

    #[test]
    fn pointer_wide_int_matches_pointer() {
        let p = Type::ptr(Type::int(32));
        assert!(compat(&Type::int(64), &p));
        assert!(compat(&p, &Type::int(64)));
        assert!(!compat(&Type::int(32), &p));
    }

    #[test]
    fn i8_pointer_is_a_wildcard() {
        let void_ptr = Type::ptr(Type::int(8));
        assert!(compat(&void_ptr, &Type::ptr(Type::named("struct.a"))));
        assert!(compat(
            &Type::ptr(Type::func(Type::void(), vec![], false)),
            &void_ptr
        ));
        assert!(!compat(
            &Type::ptr(Type::int(32)),
            &Type::ptr(Type::named("struct.a"))
        ));
    }

    #[test]
    fn named_records_match_by_name_only() {
        assert!(compat(&Type::named("struct.a"), &Type::named("struct.a")));
        assert!(!compat(&Type::named("struct.a"), &Type::named("struct.b")));
        // literal never matches named
        let lit = Type::literal_struct(vec![Type::int(32)]);
        assert!(!compat(&lit, &Type::named("struct.a")));
    }

    #[test]
    fn function_types_compare_signatures() {
        let f1 = Type::func(Type::int(32), vec![Type::ptr(Type::int(8))], false);
        let f2 = Type::func(Type::int(64), vec![Type::ptr(Type::named("struct.a"))], false);
        assert!(compat(&f1, &f2));

        let va1 = Type::func(Type::void(), vec![], true);
        let va2 = Type::func(Type::void(), vec![Type::int(32)], true);
        assert!(compat(&va1, &va2));
        // a variadic type only matches another variadic type
        assert!(!compat(&va1, &Type::func(Type::void(), vec![], false)));
    }
}
