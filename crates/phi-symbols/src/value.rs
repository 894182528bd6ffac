//! Runtime values and executable handles.

use std::fmt;
use std::sync::Arc;

use phi_diag::{Category, Diagnostic, IntoDiagnostic};
use phi_types::Type;

/// A runtime value. Mirrors the shapes of [`Type`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    Vector(Vec<Value>),
    /// Row-major rows of equal length.
    Matrix(Vec<Vec<Value>>),
    /// Row-major data; `data.len()` is the product of `shape`.
    Tensor {
        shape: Vec<usize>,
        data: Vec<Value>,
    },
    Sequence(Vec<Value>),
    Strategy {
        state: Box<Value>,
        action: Box<Value>,
    },
}

impl Value {
    /// A vector of numbers.
    pub fn numbers(items: impl IntoIterator<Item = f64>) -> Self {
        Value::Vector(items.into_iter().map(Value::Number).collect())
    }

    /// A matrix of numbers, given row by row.
    pub fn number_rows<R>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = f64>,
    {
        Value::Matrix(
            rows.into_iter()
                .map(|row| row.into_iter().map(Value::Number).collect())
                .collect(),
        )
    }

    pub fn strategy(state: Value, action: Value) -> Self {
        Value::Strategy {
            state: Box::new(state),
            action: Box::new(action),
        }
    }

    /// Numeric view with the scalar widenings applied (`Bool` and `Int`
    /// read as numbers).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Elements of a vector or sequence.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::Vector(items) | Value::Sequence(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Number(n) => write!(f, "{n:?}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Vector(items) => write_list(f, items),
            Value::Matrix(rows) => {
                write!(f, "[")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_list(f, row)?;
                }
                write!(f, "]")
            }
            Value::Tensor { shape, data } => {
                write!(f, "tensor{shape:?}")?;
                write_list(f, data)
            }
            Value::Sequence(items) => {
                write!(f, "seq")?;
                write_list(f, items)
            }
            Value::Strategy { state, action } => write!(f, "strategy({state}, {action})"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecError {
    #[error("expected a value of type {expected}, got {found}")]
    Rejected { expected: Type, found: Value },
    #[error("{0}")]
    Failed(String),
    #[error("`{operation}` failed: {source}")]
    InOperation {
        operation: String,
        source: Box<ExecError>,
    },
}

impl ExecError {
    pub fn failed(message: impl Into<String>) -> Self {
        ExecError::Failed(message.into())
    }

    /// Attach the name of the operation that was running.
    pub fn in_operation(self, operation: impl Into<String>) -> Self {
        ExecError::InOperation {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, without operation context.
    pub fn root(&self) -> &ExecError {
        match self {
            ExecError::InOperation { source, .. } => source.root(),
            other => other,
        }
    }
}

impl IntoDiagnostic for ExecError {
    fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(Category::Execution, self.to_string());
        if let ExecError::InOperation { operation, .. } = self {
            diag = diag.about(operation.clone());
        }
        if let ExecError::Rejected { .. } = self.root() {
            diag = diag.with_help("check the operation's declared input type");
        }
        diag
    }
}

type ExecFn = dyn Fn(&Value) -> Result<Value, ExecError> + Send + Sync;

/// Shared, thread-safe handle to an operation's implementation.
#[derive(Clone)]
pub struct Executable(Arc<ExecFn>);

impl Executable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ExecError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Returns its input unchanged.
    pub fn identity() -> Self {
        Self::new(|value| Ok(value.clone()))
    }

    pub fn call(&self, input: &Value) -> Result<Value, ExecError> {
        (self.0)(input)
    }

    pub fn ptr_eq(&self, other: &Executable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Executable(..)")
    }
}
