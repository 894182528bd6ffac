//! Operations and their composition.
//!
//! An [`Operation`] is a typed, executable function lifted from a registered
//! symbol. [`phi`] chains two operations when the first one's output is
//! [`compatible`] with the second one's input. [`psi`] applies a
//! transformation to an operation and rejects it if the signature changed.

pub mod conform;

use std::fmt;

use phi_diag::{Category, Diagnostic, IntoDiagnostic};
use phi_infer::compatible;
use phi_symbols::{Complexity, ExecError, Executable, SymbolDefinition, Value};
use phi_types::Type;

pub use conform::conforms;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error(
        "cannot compose `{first}` with `{second}`: `{first}` produces {output}, but `{second}` expects {input}"
    )]
    Composition {
        first: String,
        second: String,
        output: Type,
        input: Type,
    },
    #[error("transforming `{operation}` changed its signature from {before} to {after}")]
    ContractViolation {
        operation: String,
        before: Type,
        after: Type,
    },
    #[error("`{name}` has type {ty}, which is not an operation")]
    NotAnOperation { name: String, ty: Type },
}

impl IntoDiagnostic for ComposeError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ComposeError::Composition { first, second, .. } => {
                Diagnostic::error(Category::Composition, self.to_string())
                    .about(format!("{first} >> {second}"))
                    .with_note("composition accepts equal types, type variables, scalar widenings and declared subtypes")
            }
            ComposeError::ContractViolation { operation, .. } => {
                Diagnostic::error(Category::ContractViolation, self.to_string())
                    .about(operation.clone())
                    .with_help("a transformation may change behavior but not input or output types")
            }
            ComposeError::NotAnOperation { name, .. } => {
                Diagnostic::error(Category::NotAnOperation, self.to_string())
                    .about(name.clone())
                    .with_help("only symbols with a function type can be composed or executed")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// How an operation came to be.
#[derive(Debug, Clone)]
pub enum Origin {
    Primitive,
    /// `first` feeds `second`. Owns both constituents.
    Composed(Box<Operation>, Box<Operation>),
    /// Result of a checked transformation of the original.
    Transformed(Box<Operation>),
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub input: Type,
    pub output: Type,
    pub executable: Executable,
    pub pure: bool,
    pub level: u8,
    pub complexity: Option<Complexity>,
    pub origin: Origin,
}

impl Operation {
    /// A pure, level-0 primitive of unknown cost.
    pub fn new(name: impl Into<String>, input: Type, output: Type, executable: Executable) -> Self {
        Self {
            name: name.into(),
            input,
            output,
            executable,
            pure: true,
            level: 0,
            complexity: None,
            origin: Origin::Primitive,
        }
    }

    /// Lift a registered symbol. Its declared type must be a function type.
    pub fn from_symbol(definition: &SymbolDefinition) -> Result<Self, ComposeError> {
        let (input, output) =
            definition
                .ty()
                .as_function()
                .ok_or_else(|| ComposeError::NotAnOperation {
                    name: definition.name.clone(),
                    ty: definition.ty().clone(),
                })?;
        Ok(Self {
            name: definition.name.clone(),
            input: input.clone(),
            output: output.clone(),
            executable: definition.executable.clone(),
            pure: definition.metadata.pure,
            level: definition.level,
            complexity: definition.metadata.complexity,
            origin: Origin::Primitive,
        })
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn impure(mut self) -> Self {
        self.pure = false;
        self
    }

    /// `input -> output`.
    pub fn signature(&self) -> Type {
        Type::function(self.input.clone(), self.output.clone())
    }

    /// Run the operation after checking that `input` fits the input type.
    pub fn execute(&self, input: &Value) -> Result<Value, ExecError> {
        if !conforms(input, &self.input) {
            return Err(ExecError::Rejected {
                expected: self.input.clone(),
                found: input.clone(),
            }
            .in_operation(&self.name));
        }
        self.executable.call(input).map_err(|err| match err {
            ExecError::InOperation { .. } => err,
            other => other.in_operation(&self.name),
        })
    }

    /// Names of the primitive operations this one is built from, in
    /// execution order.
    pub fn primitives(&self) -> Vec<&str> {
        match &self.origin {
            Origin::Primitive | Origin::Transformed(_) => vec![self.name.as_str()],
            Origin::Composed(first, second) => {
                let mut names = first.primitives();
                names.extend(second.primitives());
                names
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.name, self.signature())
    }
}

// ---------------------------------------------------------------------------
// φ and ψ
// ---------------------------------------------------------------------------

/// Compose `first` then `second`.
///
/// The result runs `first` and feeds its output to `second`. It sits at the
/// higher of the two levels, is pure only if both are, and has signature
/// `first.input -> second.output`.
pub fn phi(first: &Operation, second: &Operation) -> Result<Operation, ComposeError> {
    if !compatible(&first.output, &second.input) {
        return Err(ComposeError::Composition {
            first: first.name.clone(),
            second: second.name.clone(),
            output: first.output.clone(),
            input: second.input.clone(),
        });
    }

    let (f, g) = (first.clone(), second.clone());
    let executable = Executable::new(move |input| {
        let middle = f.execute(input)?;
        g.execute(&middle)
    });
    let complexity = match (first.complexity, second.complexity) {
        (Some(a), Some(b)) => Some(a.combine(b)),
        _ => None,
    };

    Ok(Operation {
        name: format!("{} >> {}", first.name, second.name),
        input: first.input.clone(),
        output: second.output.clone(),
        executable,
        pure: first.pure && second.pure,
        level: first.level.max(second.level),
        complexity,
        origin: Origin::Composed(Box::new(first.clone()), Box::new(second.clone())),
    })
}

/// Apply `transform` to `operation`, keeping the result only if its input
/// and output types are unchanged.
pub fn psi<F>(operation: &Operation, transform: F) -> Result<Operation, ComposeError>
where
    F: FnOnce(&Operation) -> Operation,
{
    let mut transformed = transform(operation);
    if transformed.input != operation.input || transformed.output != operation.output {
        return Err(ComposeError::ContractViolation {
            operation: operation.name.clone(),
            before: operation.signature(),
            after: transformed.signature(),
        });
    }
    transformed.origin = Origin::Transformed(Box::new(operation.clone()));
    Ok(transformed)
}

#[cfg(test)]
mod tests {
    use phi_symbols::SymbolTable;

    use super::*;

    fn numeric(name: &str, f: fn(f64) -> f64) -> Operation {
        Operation::new(
            name,
            Type::NUMBER,
            Type::NUMBER,
            Executable::new(move |v| {
                let n = v
                    .as_number()
                    .ok_or_else(|| ExecError::failed("expected a number"))?;
                Ok(Value::Number(f(n)))
            }),
        )
    }

    fn show() -> Operation {
        Operation::new(
            "show",
            Type::NUMBER,
            Type::STRING,
            Executable::new(|v| Ok(Value::Text(v.to_string()))),
        )
    }

    #[test]
    fn phi_runs_first_then_second() {
        let inc = numeric("inc", |n| n + 1.0).with_level(1);
        let double = numeric("double", |n| n * 2.0).with_level(3);
        let composed = phi(&inc, &double).unwrap();

        assert_eq!(composed.name, "inc >> double");
        assert_eq!(composed.signature(), Type::function(Type::NUMBER, Type::NUMBER));
        assert_eq!(composed.level, 3);
        assert!(composed.pure);
        assert_eq!(composed.primitives(), vec!["inc", "double"]);
        assert_eq!(
            composed.execute(&Value::Number(1.0)).unwrap(),
            Value::Number(4.0)
        );
    }

    #[test]
    fn phi_rejects_incompatible_types() {
        let err = phi(&show(), &numeric("double", |n| n * 2.0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot compose `show` with `double`: `show` produces String, but `double` expects Number"
        );
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, "E0301");
        assert_eq!(diag.subject.as_deref(), Some("show >> double"));
    }

    #[test]
    fn phi_accepts_widening_and_subtypes() {
        let count = Operation::new(
            "count",
            Type::STRING,
            Type::INT,
            Executable::new(|v| Ok(Value::Int(v.as_text().map_or(0, |s| s.len() as i64)))),
        );
        let composed = phi(&count, &numeric("half", |n| n / 2.0)).unwrap();
        assert_eq!(
            composed.execute(&Value::Text("abcd".into())).unwrap(),
            Value::Number(2.0)
        );

        let embed = Operation::new(
            "embed",
            Type::NUMBER,
            Type::vector(3, Type::NUMBER),
            Executable::new(|v| {
                let n = v.as_number().unwrap_or_default();
                Ok(Value::numbers([n, n, n]))
            }),
        );
        let norm = Operation::new(
            "sum",
            Type::tensor([3], Type::NUMBER),
            Type::NUMBER,
            Executable::new(|v| {
                let total = v
                    .as_items()
                    .map(|items| items.iter().filter_map(Value::as_number).sum())
                    .unwrap_or_default();
                Ok(Value::Number(total))
            }),
        );
        let composed = phi(&embed, &norm).unwrap();
        assert_eq!(
            composed.execute(&Value::Number(2.0)).unwrap(),
            Value::Number(6.0)
        );
    }

    #[test]
    fn phi_combines_purity_and_complexity() {
        let sort = numeric("sort", |n| n)
            .with_complexity(Complexity::Linearithmic)
            .impure();
        let scan = numeric("scan", |n| n).with_complexity(Complexity::Linear);
        let composed = phi(&sort, &scan).unwrap();
        assert!(!composed.pure);
        assert_eq!(composed.complexity, Some(Complexity::Cubic));

        let unknown = phi(&scan, &numeric("id", |n| n)).unwrap();
        assert_eq!(unknown.complexity, None);
    }

    #[test]
    fn execute_rejects_nonconforming_input() {
        let double = numeric("double", |n| n * 2.0);
        let err = double.execute(&Value::Text("x".into())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "`double` failed: expected a value of type Number, got \"x\""
        );
        assert_eq!(double.execute(&Value::Int(2)).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn execute_rejects_tensor_with_overflowing_shape() {
        let shape = vec![usize::MAX / 2, 3];
        let op = Operation::new(
            "flatten",
            Type::tensor(shape.clone(), Type::NUMBER),
            Type::NUMBER,
            Executable::identity(),
        );
        let input = Value::Tensor {
            shape,
            data: Vec::new(),
        };
        let err = op.execute(&input).unwrap_err();
        assert!(matches!(err.root(), ExecError::Rejected { .. }));
        assert!(matches!(err, ExecError::InOperation { ref operation, .. } if operation == "flatten"));
    }

    #[test]
    fn composed_errors_name_the_failing_step() {
        let fails = Operation::new(
            "fails",
            Type::NUMBER,
            Type::NUMBER,
            Executable::new(|_| Err(ExecError::failed("division by zero"))),
        );
        let composed = phi(&numeric("inc", |n| n + 1.0), &fails).unwrap();
        let err = composed.execute(&Value::Number(1.0)).unwrap_err();
        assert_eq!(err.to_string(), "`fails` failed: division by zero");
    }

    #[test]
    fn psi_keeps_signature() {
        let double = numeric("double", |n| n * 2.0);
        let memoized = psi(&double, |op| Operation {
            name: format!("memo({})", op.name),
            ..op.clone()
        })
        .unwrap();
        assert_eq!(memoized.name, "memo(double)");
        assert!(matches!(memoized.origin, Origin::Transformed(ref original) if original.name == "double"));
        assert_eq!(
            memoized.execute(&Value::Number(3.0)).unwrap(),
            Value::Number(6.0)
        );
    }

    #[test]
    fn psi_rejects_changed_signature() {
        let double = numeric("double", |n| n * 2.0);
        let err = psi(&double, |op| Operation {
            output: Type::STRING,
            ..op.clone()
        })
        .unwrap_err();
        assert_eq!(
            err,
            ComposeError::ContractViolation {
                operation: "double".into(),
                before: Type::function(Type::NUMBER, Type::NUMBER),
                after: Type::function(Type::NUMBER, Type::STRING),
            }
        );
        assert_eq!(err.to_diagnostic().code, "E0302");
    }

    #[test]
    fn psi_uses_structural_equality() {
        // Widening is fine for composition but not for a contract.
        let double = numeric("double", |n| n * 2.0);
        let err = psi(&double, |op| Operation {
            input: Type::INT,
            ..op.clone()
        });
        assert!(err.is_err());
    }

    #[test]
    fn from_symbol_requires_function_type() {
        let mut table = SymbolTable::new();
        table
            .register(
                SymbolDefinition::new(
                    "double",
                    1,
                    Type::function(Type::NUMBER, Type::NUMBER),
                    Executable::identity(),
                )
                .with_complexity(Complexity::Constant),
            )
            .unwrap();
        table
            .register(SymbolDefinition::new(
                "pi",
                0,
                Type::NUMBER,
                Executable::identity(),
            ))
            .unwrap();

        let op = Operation::from_symbol(table.get("double").unwrap()).unwrap();
        assert_eq!(op.level, 1);
        assert_eq!(op.complexity, Some(Complexity::Constant));
        assert_eq!(op.to_string(), "double : Number -> Number");

        let err = Operation::from_symbol(table.get("pi").unwrap()).unwrap_err();
        assert_eq!(
            err,
            ComposeError::NotAnOperation {
                name: "pi".into(),
                ty: Type::NUMBER,
            }
        );
        assert_eq!(err.to_diagnostic().code, "E0303");
    }
}
