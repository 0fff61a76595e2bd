use num_traits::Float;

use super::Function;
use crate::container::Container;
use crate::error::Result;

/// Separable function on pairs, `F(x1, x2) = F1(x1) + F2(x2)`.
///
/// Every operation splits across the two blocks, so proximal operators
/// and conjugates exist whenever they exist for both parts.
#[derive(Clone, Debug)]
pub struct BlockFunction<F1, F2> {
    first: F1,
    second: F2,
}

impl<F1, F2> BlockFunction<F1, F2> {
    pub fn new(first: F1, second: F2) -> Self {
        BlockFunction { first, second }
    }

    pub fn first(&self) -> &F1 {
        &self.first
    }

    pub fn second(&self) -> &F2 {
        &self.second
    }
}

impl<X1, X2, F1, F2> Function<(X1, X2)> for BlockFunction<F1, F2>
where
    X1: Container,
    X2: Container<Elem = X1::Elem>,
    F1: Function<X1>,
    F2: Function<X2>,
{
    fn call(&self, x: &(X1, X2)) -> Result<X1::Elem> {
        Ok(self.first.call(&x.0)? + self.second.call(&x.1)?)
    }

    fn gradient_to(&self, x: &(X1, X2), out: &mut (X1, X2)) -> Result<()> {
        self.first.gradient_to(&x.0, &mut out.0)?;
        self.second.gradient_to(&x.1, &mut out.1)
    }

    fn proximal_to(&self, x: &(X1, X2), tau: X1::Elem, out: &mut (X1, X2)) -> Result<()> {
        self.first.proximal_to(&x.0, tau, &mut out.0)?;
        self.second.proximal_to(&x.1, tau, &mut out.1)
    }

    fn convex_conjugate(&self, x: &(X1, X2)) -> Result<X1::Elem> {
        Ok(self.first.convex_conjugate(&x.0)? + self.second.convex_conjugate(&x.1)?)
    }

    fn lipschitz(&self) -> Option<X1::Elem> {
        Some(Float::max(self.first.lipschitz()?, self.second.lipschitz()?))
    }

    fn name(&self) -> &'static str {
        "BlockFunction"
    }
}
