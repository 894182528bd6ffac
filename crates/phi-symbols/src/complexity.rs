//! Asymptotic cost classes attached to symbols and operations.

use std::fmt;

use serde::Serialize;

/// Growth class of an operation's cost in its input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Constant,
    Logarithmic,
    Linear,
    Linearithmic,
    Quadratic,
    Cubic,
    /// Degree four or higher.
    Polynomial,
    Exponential,
}

/// Bounded classes as `(polynomial degree, log power)`, ascending.
const BOUNDED: [(Complexity, u32, u32); 6] = [
    (Complexity::Constant, 0, 0),
    (Complexity::Logarithmic, 0, 1),
    (Complexity::Linear, 1, 0),
    (Complexity::Linearithmic, 1, 1),
    (Complexity::Quadratic, 2, 0),
    (Complexity::Cubic, 3, 0),
];

impl Complexity {
    fn exponents(self) -> Option<(u32, u32)> {
        match self {
            Complexity::Polynomial => Some((4, 0)),
            Complexity::Exponential => None,
            bounded => BOUNDED
                .iter()
                .find(|(class, _, _)| *class == bounded)
                .map(|&(_, degree, log)| (degree, log)),
        }
    }

    /// Cost of running `self` and `other` in sequence, one feeding the other.
    ///
    /// `Constant` is the identity and `Exponential` absorbs everything.
    /// Otherwise degrees and log powers add and the result rounds up to the
    /// smallest class that dominates it.
    pub fn combine(self, other: Complexity) -> Complexity {
        let (Some((d1, l1)), Some((d2, l2))) = (self.exponents(), other.exponents()) else {
            return Complexity::Exponential;
        };
        let (degree, log) = (d1 + d2, l1 + l2);
        BOUNDED
            .iter()
            .find(|&&(_, d, l)| d > degree || (d == degree && l >= log))
            .map_or(Complexity::Polynomial, |&(class, _, _)| class)
    }

    pub fn notation(self) -> &'static str {
        match self {
            Complexity::Constant => "O(1)",
            Complexity::Logarithmic => "O(log n)",
            Complexity::Linear => "O(n)",
            Complexity::Linearithmic => "O(n log n)",
            Complexity::Quadratic => "O(n^2)",
            Complexity::Cubic => "O(n^3)",
            Complexity::Polynomial => "O(n^k)",
            Complexity::Exponential => "O(2^n)",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notation())
    }
}
