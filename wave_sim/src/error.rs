//! Error types for the simulation engine.

use std::error::Error;
use std::fmt;

use crate::config::ConfigError;

/// Problems reported by a potential source while checking a new expression.
///
/// These are user-input errors: the simulation state is left untouched when
/// one is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum EquationError {
    /// No expression was entered.
    Empty,
    /// The expression uses a function the evaluator refuses to run.
    Forbidden {
        /// Name of the rejected function.
        name: String,
    },
    /// The expression contains symbols the evaluator does not know.
    UnknownSymbols,
    /// Brackets do not balance.
    BracketMismatch,
    /// Evaluation produced NaN somewhere on the grid.
    Undefined,
    /// Any other evaluator message, passed through verbatim.
    Other {
        /// Message from the evaluator.
        message: String,
    },
}

impl fmt::Display for EquationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no equation was entered"),
            Self::Forbidden { name } => write!(f, "{name} is forbidden"),
            Self::UnknownSymbols => write!(f, "unknown symbols"),
            Self::BracketMismatch => write!(f, "extra/missing brackets"),
            Self::Undefined => write!(f, "undefined values encountered"),
            Self::Other { message } => write!(f, "{message}"),
        }
    }
}

impl Error for EquationError {}

/// Top-level error for engine operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Configuration failed validation.
    Config(ConfigError),
    /// A new potential expression was rejected.
    Equation(EquationError),
    /// A grid index fell outside `[0, N)`.
    IndexOutOfBounds {
        /// Offending `(i, j)` pair.
        index: (usize, usize),
        /// Samples per side.
        side: usize,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Equation(e) => write!(f, "equation: {e}"),
            Self::IndexOutOfBounds { index, side } => {
                write!(f, "index {index:?} out of bounds for {side}x{side} grid")
            }
        }
    }
}

impl Error for SimError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Equation(e) => Some(e),
            Self::IndexOutOfBounds { .. } => None,
        }
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<EquationError> for SimError {
    fn from(e: EquationError) -> Self {
        Self::Equation(e)
    }
}
