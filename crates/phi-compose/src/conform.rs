//! Runtime check that a value fits a declared type.

use phi_infer::widens;
use phi_symbols::Value;
use phi_types::{ScalarKind, Type};

/// Does `value` inhabit `ty`?
///
/// Type variables accept anything. Scalars follow the composition widenings,
/// and vectors and matrices also fit the tensor and sequence types they are
/// declared subtypes of. No value inhabits a function type.
pub fn conforms(value: &Value, ty: &Type) -> bool {
    match (value, ty) {
        (_, Type::Var(_)) => true,
        (_, Type::Scalar(kind)) => {
            scalar_kind(value).is_some_and(|found| widens(found, *kind))
        }
        (Value::Vector(items), Type::Vector { len, element }) => {
            items.len() == *len && all_conform(items, element)
        }
        (Value::Vector(items), Type::Tensor { shape, element }) => {
            shape.as_slice() == [items.len()] && all_conform(items, element)
        }
        (Value::Vector(items) | Value::Sequence(items), Type::Sequence(element)) => {
            all_conform(items, element)
        }
        (
            Value::Matrix(rows),
            Type::Matrix {
                rows: n_rows,
                cols,
                element,
            },
        ) => {
            rows.len() == *n_rows
                && rows
                    .iter()
                    .all(|row| row.len() == *cols && all_conform(row, element))
        }
        (Value::Matrix(rows), Type::Tensor { shape, element }) => {
            let cols = rows.first().map_or(0, Vec::len);
            shape.as_slice() == [rows.len(), cols]
                && rows
                    .iter()
                    .all(|row| row.len() == cols && all_conform(row, element))
        }
        (
            Value::Tensor { shape, data },
            Type::Tensor {
                shape: expected,
                element,
            },
        ) => {
            shape == expected
                && element_count(shape) == Some(data.len())
                && all_conform(data, element)
        }
        (
            Value::Strategy { state, action },
            Type::Strategy {
                state: state_ty,
                action: action_ty,
            },
        ) => conforms(state, state_ty) && conforms(action, action_ty),
        _ => false,
    }
}

fn all_conform(items: &[Value], element: &Type) -> bool {
    items.iter().all(|item| conforms(item, element))
}

/// Product of the dimensions, or `None` if it overflows `usize`.
fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
}

fn scalar_kind(value: &Value) -> Option<ScalarKind> {
    match value {
        Value::Bool(_) => Some(ScalarKind::Bool),
        Value::Int(_) => Some(ScalarKind::Int),
        Value::Number(_) => Some(ScalarKind::Number),
        Value::Text(_) => Some(ScalarKind::String),
        _ => None,
    }
}
