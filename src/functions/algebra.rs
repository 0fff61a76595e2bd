//! Runtime Algebra on Boxed Functions
//!
//! The combinator constructors build sums, scalings and translations with
//! their types known statically. When the shape of an expression is only
//! known at run time the functions here take a boxed left-hand side and a
//! tagged right-hand [`Operand`] and pick the combinator:
//!
//! | operation  | operand                | result                         |
//! |------------|------------------------|--------------------------------|
//! | `add`      | `Function(g)`          | `SumFunction(f, g)`            |
//! | `add`      | `Scalar(c)`            | `SumFunctionScalar(f, c)`      |
//! | `add`      | `Constant(c)`          | `SumFunctionScalar(f, c)`      |
//! | `add`      | `ScalarSum(g + c)`     | `SumFunctionScalar(f + g, c)`  |
//! | `subtract` | any of the above       | `add` of `(-1) * operand`      |
//! | `scale`    | `Scalar(s)`            | `ScaledFunction(f, s)`         |
//!
//! Every other pairing fails with [`Error::UnsupportedOperand`].

use num_traits::One;

use super::{
    ConstantFunction, Function, ScaledFunction, SumFunction, SumFunctionScalar, TranslateFunction,
    ZeroFunction,
};
use crate::container::Container;
use crate::error::{Error, Result};

pub type BoxedFunction<X> = Box<dyn Function<X>>;

/// Right-hand side of an algebra operation.
pub enum Operand<X: Container> {
    Function(BoxedFunction<X>),
    Scalar(X::Elem),
    Constant(ConstantFunction<X::Elem>),
    ScalarSum(SumFunctionScalar<BoxedFunction<X>, X::Elem>),
    /// A plain point of the space; never a valid operand.
    Element(X),
}

impl<X: Container> Operand<X> {
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::Function(_) => "function",
            Operand::Scalar(_) => "scalar",
            Operand::Constant(_) => "constant function",
            Operand::ScalarSum(_) => "function plus scalar",
            Operand::Element(_) => "container",
        }
    }
}

impl<X: Container> From<BoxedFunction<X>> for Operand<X> {
    fn from(f: BoxedFunction<X>) -> Self {
        Operand::Function(f)
    }
}

impl<X: Container> From<ConstantFunction<X::Elem>> for Operand<X> {
    fn from(c: ConstantFunction<X::Elem>) -> Self {
        Operand::Constant(c)
    }
}

impl<X: Container> From<ZeroFunction<X::Elem>> for Operand<X> {
    fn from(z: ZeroFunction<X::Elem>) -> Self {
        Operand::Constant(z.into())
    }
}

impl<X: Container> From<SumFunctionScalar<BoxedFunction<X>, X::Elem>> for Operand<X> {
    fn from(s: SumFunctionScalar<BoxedFunction<X>, X::Elem>) -> Self {
        Operand::ScalarSum(s)
    }
}

/// Erase the type of a concrete function.
pub fn boxed<X, F>(f: F) -> BoxedFunction<X>
where
    X: Container,
    F: Function<X> + 'static,
{
    Box::new(f)
}

/// `lhs + rhs`
pub fn add<X: Container + 'static>(
    lhs: BoxedFunction<X>,
    rhs: Operand<X>,
) -> Result<BoxedFunction<X>> {
    match rhs {
        Operand::Function(g) => Ok(Box::new(SumFunction::new(lhs, g))),
        Operand::Scalar(c) => Ok(Box::new(SumFunctionScalar::new(lhs, c))),
        Operand::Constant(c) => Ok(Box::new(SumFunctionScalar::new(lhs, c.constant()))),
        Operand::ScalarSum(s) => {
            let (g, c) = s.into_parts();
            let sum: BoxedFunction<X> = Box::new(SumFunction::new(lhs, g));
            Ok(Box::new(SumFunctionScalar::new(sum, c)))
        }
        Operand::Element(_) => Err(Error::UnsupportedOperand {
            operation: "add",
            operand: "container",
        }),
    }
}

/// `lhs - rhs`, built as `lhs + (-1) * rhs`.
pub fn subtract<X: Container + 'static>(
    lhs: BoxedFunction<X>,
    rhs: Operand<X>,
) -> Result<BoxedFunction<X>> {
    let minus_one = -X::Elem::one();
    let negated: Operand<X> = match rhs {
        Operand::Function(g) => Operand::Function(Box::new(ScaledFunction::new(g, minus_one))),
        Operand::Scalar(c) => Operand::Scalar(-c),
        Operand::Constant(c) => Operand::Scalar(-c.constant()),
        Operand::ScalarSum(s) => {
            let (g, c) = s.into_parts();
            let g: BoxedFunction<X> = Box::new(ScaledFunction::new(g, minus_one));
            Operand::ScalarSum(SumFunctionScalar::new(g, -c))
        }
        Operand::Element(_) => {
            return Err(Error::UnsupportedOperand {
                operation: "subtract",
                operand: "container",
            })
        }
    };
    add(lhs, negated)
}

/// `scalar * f`; only a plain scalar is accepted.
pub fn scale<X: Container + 'static>(
    f: BoxedFunction<X>,
    scalar: Operand<X>,
) -> Result<BoxedFunction<X>> {
    match scalar {
        Operand::Scalar(s) => Ok(Box::new(ScaledFunction::new(f, s))),
        other => Err(Error::UnsupportedOperand {
            operation: "scale",
            operand: other.kind(),
        }),
    }
}

/// `f(x - center)`
pub fn translate<X: Container + 'static>(f: BoxedFunction<X>, center: X) -> BoxedFunction<X> {
    Box::new(TranslateFunction::new(f, center))
}

impl<X: Container + 'static> dyn Function<X> {
    pub fn plus(self: Box<Self>, rhs: impl Into<Operand<X>>) -> Result<BoxedFunction<X>> {
        add(self, rhs.into())
    }

    pub fn minus(self: Box<Self>, rhs: impl Into<Operand<X>>) -> Result<BoxedFunction<X>> {
        subtract(self, rhs.into())
    }

    pub fn times(self: Box<Self>, scalar: X::Elem) -> BoxedFunction<X> {
        Box::new(ScaledFunction::new(self, scalar))
    }

    pub fn centered_at(self: Box<Self>, center: X) -> BoxedFunction<X> {
        translate(self, center)
    }
}
