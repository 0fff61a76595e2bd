use ndarray::NdFloat;

use super::Function;
use crate::container::Container;
use crate::error::Result;

/// `F(x) = c` for every `x`.
///
/// The true convex conjugate is the indicator of `{c}`, which is `+inf`
/// almost everywhere. Since infinities poison the objective traces of the
/// solvers, [`Function::convex_conjugate`] returns the hinge surrogate
/// `sum(max(x - c, 0))` instead. It is zero at `x = c` and grows linearly
/// when any component exceeds `c`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantFunction<A> {
    constant: A,
}

impl<A: NdFloat> ConstantFunction<A> {
    pub fn new(constant: A) -> Self {
        ConstantFunction { constant }
    }

    pub fn constant(&self) -> A {
        self.constant
    }
}

impl<A, X> Function<X> for ConstantFunction<A>
where
    A: NdFloat,
    X: Container<Elem = A>,
{
    fn call(&self, _x: &X) -> Result<A> {
        Ok(self.constant)
    }

    fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
        x.check_shape(out, "constant gradient output")?;
        out.set_zero();
        Ok(())
    }

    fn proximal_to(&self, x: &X, _tau: A, out: &mut X) -> Result<()> {
        x.check_shape(out, "constant proximal output")?;
        out.assign(x);
        Ok(())
    }

    fn convex_conjugate(&self, x: &X) -> Result<A> {
        let mut shifted = x.clone();
        shifted.for_each_mut(&mut |v| *v = *v - self.constant);
        Ok(shifted.maximum(A::zero()).sum())
    }

    fn lipschitz(&self) -> Option<A> {
        Some(A::zero())
    }

    fn name(&self) -> &'static str {
        "ConstantFunction"
    }
}

/// The constant function `0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZeroFunction<A> {
    inner: ConstantFunction<A>,
}

impl<A: NdFloat> ZeroFunction<A> {
    pub fn new() -> Self {
        ZeroFunction {
            inner: ConstantFunction::new(A::zero()),
        }
    }
}

impl<A: NdFloat> Default for ZeroFunction<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: NdFloat> From<ZeroFunction<A>> for ConstantFunction<A> {
    fn from(zero: ZeroFunction<A>) -> Self {
        zero.inner
    }
}

impl<A, X> Function<X> for ZeroFunction<A>
where
    A: NdFloat,
    X: Container<Elem = A>,
{
    fn call(&self, x: &X) -> Result<A> {
        self.inner.call(x)
    }

    fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
        self.inner.gradient_to(x, out)
    }

    fn proximal_to(&self, x: &X, tau: A, out: &mut X) -> Result<()> {
        self.inner.proximal_to(x, tau, out)
    }

    fn convex_conjugate(&self, x: &X) -> Result<A> {
        Function::<X>::convex_conjugate(&self.inner, x)
    }

    fn lipschitz(&self) -> Option<A> {
        Some(A::zero())
    }

    fn name(&self) -> &'static str {
        "ZeroFunction"
    }
}
