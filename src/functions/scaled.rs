use ndarray::NdFloat;
use num_traits::Float;

use super::Function;
use crate::container::{Container, ImageGeometry};
use crate::error::Result;

/// `s * F(x)`
///
/// The proximal operator uses $`\operatorname{prox}_{\tau sF} =
/// \operatorname{prox}_{(\tau s)F}`$, which only holds for `s > 0`. It is
/// applied for negative scalars as well, so the proximal of a negatively
/// scaled function is not a true proximal operator.
#[derive(Clone, Debug)]
pub struct ScaledFunction<F, A> {
    function: F,
    scalar: A,
}

impl<F, A: NdFloat> ScaledFunction<F, A> {
    pub fn new(function: F, scalar: A) -> Self {
        ScaledFunction { function, scalar }
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn scalar(&self) -> A {
        self.scalar
    }
}

impl<A, X, F> Function<X> for ScaledFunction<F, A>
where
    A: NdFloat,
    X: Container<Elem = A>,
    F: Function<X>,
{
    fn call(&self, x: &X) -> Result<A> {
        Ok(self.scalar * self.function.call(x)?)
    }

    fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
        self.function.gradient_to(x, out)?;
        out.scale_mut(self.scalar);
        Ok(())
    }

    fn proximal_to(&self, x: &X, tau: A, out: &mut X) -> Result<()> {
        self.function.proximal_to(x, tau * self.scalar, out)
    }

    fn convex_conjugate(&self, x: &X) -> Result<A> {
        let scaled = x.scaled(A::one() / self.scalar);
        Ok(self.scalar * self.function.convex_conjugate(&scaled)?)
    }

    fn lipschitz(&self) -> Option<A> {
        self.function.lipschitz().map(|l| Float::abs(self.scalar) * l)
    }

    fn domain(&self) -> Option<ImageGeometry> {
        self.function.domain()
    }

    fn name(&self) -> &'static str {
        "ScaledFunction"
    }
}
