//! Error types shared by functions, operators and solvers.

use std::fmt;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while evaluating or composing functions.
///
/// Nothing in this crate recovers from an error: every variant is
/// propagated to the caller as soon as it is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The operation has no closed form for this kind of function.
    NotImplemented {
        function: &'static str,
        operation: &'static str,
    },

    /// An algebra builder received an operand it cannot combine.
    UnsupportedOperand {
        operation: &'static str,
        operand: &'static str,
    },

    /// Input and operator/function geometry disagree.
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Invalid configuration value.
    InvalidParameter { parameter: String, message: String },

    /// The nested solver could not be built or run.
    Solver { context: String },
}

impl Error {
    pub(crate) fn not_implemented(function: &'static str, operation: &'static str) -> Self {
        Error::NotImplemented {
            function,
            operation,
        }
    }

    pub(crate) fn shape(context: &'static str, expected: &[usize], found: &[usize]) -> Self {
        Error::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented {
                function,
                operation,
            } => write!(f, "NotImplemented: {} has no closed form for {}", function, operation),
            Self::UnsupportedOperand { operation, operand } => {
                write!(f, "UnsupportedOperand: cannot {} with {}", operation, operand)
            }
            Self::ShapeMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "ShapeMismatch: {}: expected {:?}, found {:?}",
                context, expected, found
            ),
            Self::InvalidParameter { parameter, message } => {
                write!(f, "InvalidParameter '{}': {}", parameter, message)
            }
            Self::Solver { context } => write!(f, "Solver: {}", context),
        }
    }
}

impl std::error::Error for Error {}
