use super::Function;
use crate::container::{Container, ImageGeometry};
use crate::error::Result;

/// `F(x - b)`, the function `F` moved to the centre `b`.
#[derive(Clone, Debug)]
pub struct TranslateFunction<F, X> {
    function: F,
    center: X,
}

impl<F, X: Container> TranslateFunction<F, X> {
    pub fn new(function: F, center: X) -> Self {
        TranslateFunction { function, center }
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn center(&self) -> &X {
        &self.center
    }

    fn shifted(&self, x: &X) -> Result<X> {
        self.center.check_shape(x, "translation centre")?;
        Ok(x.subtracted(&self.center))
    }
}

impl<X, F> Function<X> for TranslateFunction<F, X>
where
    X: Container,
    F: Function<X>,
{
    fn call(&self, x: &X) -> Result<X::Elem> {
        self.function.call(&self.shifted(x)?)
    }

    fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
        self.function.gradient_to(&self.shifted(x)?, out)
    }

    fn proximal_to(&self, x: &X, tau: X::Elem, out: &mut X) -> Result<()> {
        self.function.proximal_to(&self.shifted(x)?, tau, out)?;
        out.add_assign_from(&self.center);
        Ok(())
    }

    fn convex_conjugate(&self, x: &X) -> Result<X::Elem> {
        self.center.check_shape(x, "translation centre")?;
        Ok(self.function.convex_conjugate(x)? + self.center.dot(x))
    }

    fn lipschitz(&self) -> Option<X::Elem> {
        self.function.lipschitz()
    }

    fn domain(&self) -> Option<ImageGeometry> {
        self.function.domain()
    }

    fn name(&self) -> &'static str {
        "TranslateFunction"
    }
}
