//! The compatibility relation used when composing operations.
//!
//! `compatible(from, to)` asks whether a value typed `from` may flow into a
//! position typed `to`. It is stated directly and is wider than
//! unification: scalars widen along a fixed allow-list and a few container
//! shapes are declared subtypes of others.

use phi_types::{ScalarKind, Type};

/// Scalar widenings accepted by composition and value conformance.
pub const SCALAR_WIDENINGS: [(ScalarKind, ScalarKind); 3] = [
    (ScalarKind::Bool, ScalarKind::Int),
    (ScalarKind::Int, ScalarKind::Number),
    (ScalarKind::Bool, ScalarKind::Number),
];

/// `from` equals `to` or widens to it.
pub fn widens(from: ScalarKind, to: ScalarKind) -> bool {
    from == to || SCALAR_WIDENINGS.contains(&(from, to))
}

/// Can a value of type `from` be used where `to` is expected?
pub fn compatible(from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    match (from, to) {
        // Unconstrained; inference resolves these later.
        (Type::Var(_), _) | (_, Type::Var(_)) => true,

        (Type::Scalar(a), Type::Scalar(b)) => widens(*a, *b),

        (
            Type::Vector { len: n, element: e },
            Type::Vector {
                len: m,
                element: f,
            },
        ) => n == m && compatible(e, f),
        (
            Type::Matrix {
                rows: r1,
                cols: c1,
                element: e,
            },
            Type::Matrix {
                rows: r2,
                cols: c2,
                element: f,
            },
        ) => r1 == r2 && c1 == c2 && compatible(e, f),
        (
            Type::Tensor { shape: s1, element: e },
            Type::Tensor { shape: s2, element: f },
        ) => s1 == s2 && compatible(e, f),
        (Type::Sequence(e), Type::Sequence(f)) => compatible(e, f),

        // Declared subtypes.
        (Type::Vector { len, element: e }, Type::Tensor { shape, element: f }) => {
            shape.as_slice() == [*len] && compatible(e, f)
        }
        (
            Type::Matrix {
                rows,
                cols,
                element: e,
            },
            Type::Tensor { shape, element: f },
        ) => shape.as_slice() == [*rows, *cols] && compatible(e, f),
        (Type::Vector { element: e, .. }, Type::Sequence(f)) => compatible(e, f),

        (Type::Function(i1, o1), Type::Function(i2, o2)) => {
            compatible(i2, i1) && compatible(o1, o2)
        }
        (
            Type::Strategy {
                state: s1,
                action: a1,
            },
            Type::Strategy {
                state: s2,
                action: a2,
            },
        ) => compatible(s1, s2) && compatible(a1, a2),

        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_types_are_compatible() {
        let ty = Type::function(Type::matrix(2, 2, Type::NUMBER), Type::NUMBER);
        assert!(compatible(&ty, &ty));
    }

    #[test]
    fn variables_accept_anything() {
        assert!(compatible(&Type::var("a"), &Type::STRING));
        assert!(compatible(&Type::vector(3, Type::INT), &Type::fresh(4)));
    }

    #[test]
    fn scalar_widenings_follow_allow_list() {
        assert!(compatible(&Type::BOOL, &Type::INT));
        assert!(compatible(&Type::INT, &Type::NUMBER));
        assert!(compatible(&Type::BOOL, &Type::NUMBER));

        assert!(!compatible(&Type::NUMBER, &Type::INT));
        assert!(!compatible(&Type::NUMBER, &Type::STRING));
        assert!(!compatible(&Type::STRING, &Type::NUMBER));
    }

    #[test]
    fn containers_are_covariant_and_size_exact() {
        assert!(compatible(
            &Type::vector(3, Type::INT),
            &Type::vector(3, Type::NUMBER)
        ));
        assert!(!compatible(
            &Type::vector(3, Type::NUMBER),
            &Type::vector(4, Type::NUMBER)
        ));
        assert!(!compatible(
            &Type::sequence(Type::NUMBER),
            &Type::sequence(Type::INT)
        ));
    }

    #[test]
    fn declared_subtypes() {
        assert!(compatible(
            &Type::vector(3, Type::NUMBER),
            &Type::tensor([3], Type::NUMBER)
        ));
        assert!(compatible(
            &Type::matrix(2, 3, Type::INT),
            &Type::tensor([2, 3], Type::NUMBER)
        ));
        assert!(compatible(
            &Type::vector(5, Type::BOOL),
            &Type::sequence(Type::BOOL)
        ));

        assert!(!compatible(
            &Type::matrix(2, 3, Type::NUMBER),
            &Type::tensor([3, 2], Type::NUMBER)
        ));
        assert!(!compatible(
            &Type::tensor([3], Type::NUMBER),
            &Type::vector(3, Type::NUMBER)
        ));
        assert!(!compatible(
            &Type::sequence(Type::NUMBER),
            &Type::vector(3, Type::NUMBER)
        ));
    }

    #[test]
    fn functions_are_contravariant_in_input() {
        let takes_number = Type::function(Type::NUMBER, Type::INT);
        let takes_int = Type::function(Type::INT, Type::NUMBER);
        assert!(compatible(&takes_number, &takes_int));
        assert!(!compatible(&takes_int, &takes_number));
    }

    #[test]
    fn strategies_are_covariant() {
        assert!(compatible(
            &Type::strategy(Type::INT, Type::BOOL),
            &Type::strategy(Type::NUMBER, Type::INT)
        ));
        assert!(!compatible(
            &Type::strategy(Type::NUMBER, Type::BOOL),
            &Type::strategy(Type::INT, Type::BOOL)
        ));
    }
}
