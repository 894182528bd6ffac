//! Workload builders shared by the benchmarks.

use phi::{Executable, Expr, Literal, SymbolDefinition, SymbolTable, Type};

/// A layered table: `width` symbols per level, each depending on every
/// symbol of the level below.
pub fn layered_table(width: usize) -> SymbolTable {
    let mut table = SymbolTable::new();
    for level in 0..=phi::MAX_LEVEL {
        for i in 0..width {
            let deps: Vec<String> = if level == 0 {
                Vec::new()
            } else {
                (0..width).map(|j| symbol_name(level - 1, j)).collect()
            };
            let definition = SymbolDefinition::new(
                symbol_name(level, i),
                level,
                Type::function(Type::NUMBER, Type::NUMBER),
                Executable::identity(),
            )
            .depends_on(deps);
            if let Err(err) = table.register(definition) {
                panic!("layered table rejected a definition: {err}");
            }
        }
    }
    table
}

pub fn symbol_name(level: u8, index: usize) -> String {
    format!("l{level}_{index}")
}

/// `f(f(...f(1.0)))`, `depth` applications deep.
pub fn nested_application(function: &str, depth: usize) -> Expr {
    (0..depth).fold(Expr::lit(Literal::Number(1.0)), |acc, _| {
        Expr::app(Expr::var(function), acc)
    })
}

/// A left-nested chain of `depth` compositions of `function`.
pub fn composition_chain(function: &str, depth: usize) -> Expr {
    (0..depth).fold(Expr::var(function), |acc, _| {
        Expr::compose(acc, Expr::var(function))
    })
}

/// `Vector<n, Vector<n, ... Number>>` nested `depth` times.
pub fn nested_vector(len: usize, depth: usize) -> Type {
    (0..depth).fold(Type::NUMBER, |acc, _| Type::vector(len, acc))
}
