use ndarray::NdFloat;

use super::{ConstantFunction, Function};
use crate::container::{Container, ImageGeometry};
use crate::error::Result;

/// `F(x) + G(x)`
///
/// Only evaluation and the gradient have closed forms; the proximal
/// operator and convex conjugate of a general sum fail with
/// [`crate::error::Error::NotImplemented`].
#[derive(Clone, Debug)]
pub struct SumFunction<F, G> {
    first: F,
    second: G,
}

impl<F, G> SumFunction<F, G> {
    pub fn new(first: F, second: G) -> Self {
        SumFunction { first, second }
    }

    pub fn first(&self) -> &F {
        &self.first
    }

    pub fn second(&self) -> &G {
        &self.second
    }

    pub fn into_parts(self) -> (F, G) {
        (self.first, self.second)
    }
}

impl<X, F, G> Function<X> for SumFunction<F, G>
where
    X: Container,
    F: Function<X>,
    G: Function<X>,
{
    fn call(&self, x: &X) -> Result<X::Elem> {
        Ok(self.first.call(x)? + self.second.call(x)?)
    }

    fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
        let mut tmp = x.zeros_like();
        self.first.gradient_to(x, &mut tmp)?;
        self.second.gradient_to(x, out)?;
        out.add_assign_from(&tmp);
        Ok(())
    }

    fn lipschitz(&self) -> Option<X::Elem> {
        Some(self.first.lipschitz()? + self.second.lipschitz()?)
    }

    fn domain(&self) -> Option<ImageGeometry> {
        self.first.domain().or_else(|| self.second.domain())
    }

    fn name(&self) -> &'static str {
        "SumFunction"
    }
}

/// `F(x) + c`, a sum that keeps the closed forms of `F`.
#[derive(Clone, Debug)]
pub struct SumFunctionScalar<F, A> {
    sum: SumFunction<F, ConstantFunction<A>>,
}

impl<F, A: NdFloat> SumFunctionScalar<F, A> {
    pub fn new(function: F, constant: A) -> Self {
        SumFunctionScalar {
            sum: SumFunction::new(function, ConstantFunction::new(constant)),
        }
    }

    pub fn function(&self) -> &F {
        self.sum.first()
    }

    pub fn constant(&self) -> A {
        self.sum.second().constant()
    }

    pub fn into_parts(self) -> (F, A) {
        let (function, constant) = self.sum.into_parts();
        (function, constant.constant())
    }
}

impl<A, X, F> Function<X> for SumFunctionScalar<F, A>
where
    A: NdFloat,
    X: Container<Elem = A>,
    F: Function<X>,
{
    fn call(&self, x: &X) -> Result<A> {
        self.sum.call(x)
    }

    fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
        self.sum.gradient_to(x, out)
    }

    fn proximal_to(&self, x: &X, tau: A, out: &mut X) -> Result<()> {
        self.function().proximal_to(x, tau, out)
    }

    fn convex_conjugate(&self, x: &X) -> Result<A> {
        Ok(self.function().convex_conjugate(x)? - self.constant())
    }

    fn lipschitz(&self) -> Option<A> {
        self.function().lipschitz()
    }

    fn domain(&self) -> Option<ImageGeometry> {
        self.function().domain()
    }

    fn name(&self) -> &'static str {
        "SumFunctionScalar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::BlockContainer;
    use crate::error::Error;
    use crate::functions::tests::{assert_moreau, random_vector};
    use crate::functions::{L2NormSquared, MixedL21Norm, ScaledFunction, ZeroFunction};
    use approx::assert_abs_diff_eq;
    use ndarray::prelude::*;

    #[test]
    fn sum_of_gradients() {
        let b = array![1., -1., 2.];
        let f = SumFunction::new(L2NormSquared::centered(b.clone()), L2NormSquared::new());
        let x = array![0.5, 0., 1.];
        // 2(x - b) + 2x
        let expected = (&x - &b) * 2. + &x * 2.;
        assert_abs_diff_eq!(f.gradient(&x).unwrap(), expected);

        let mut out = array![9., 9., 9.];
        f.gradient_to(&x, &mut out).unwrap();
        assert_abs_diff_eq!(out, expected);

        assert_abs_diff_eq!(
            f.call(&x).unwrap(),
            (&x - &b).mapv(|v| v * v).sum() + x.dot(&x)
        );
        assert_eq!(f.lipschitz(), Some(4.));
    }

    #[test]
    fn lipschitz_requires_both_terms() {
        type Blocks = BlockContainer<Array1<f64>>;
        let f = SumFunction::new(L2NormSquared::<Blocks>::new(), MixedL21Norm);
        assert_eq!(Function::<Blocks>::lipschitz(&f), None);
        let g = SumFunction::new(L2NormSquared::new(), ZeroFunction::new());
        assert_eq!(Function::<Array1<f64>>::lipschitz(&g), Some(2.));
    }

    #[test]
    fn general_sum_has_no_proximal() {
        let f = SumFunction::new(L2NormSquared::new(), L2NormSquared::new());
        let x = array![1., 2.];
        assert!(matches!(
            f.proximal(&x, 1.),
            Err(Error::NotImplemented { .. })
        ));
        assert!(f.convex_conjugate(&x).is_err());
    }

    #[test]
    fn scalar_sum_closed_forms() {
        let f = ScaledFunction::new(L2NormSquared::centered(array![0.5, -0.5, 1., 0.]), 1.5);
        let g = SumFunctionScalar::new(f.clone(), -4.);
        let x = random_vector(4, 11);
        let tau = 0.8;

        assert_abs_diff_eq!(g.call(&x).unwrap(), f.call(&x).unwrap() - 4.);
        assert_abs_diff_eq!(g.proximal(&x, tau).unwrap(), f.proximal(&x, tau).unwrap());
        assert_abs_diff_eq!(
            g.convex_conjugate(&x).unwrap(),
            f.convex_conjugate(&x).unwrap() + 4.
        );
        assert_abs_diff_eq!(g.gradient(&x).unwrap(), f.gradient(&x).unwrap());
        assert_eq!(g.lipschitz(), f.lipschitz());
        assert_moreau(&g, &x, tau);

        let (inner, c) = g.into_parts();
        assert_eq!(c, -4.);
        assert_eq!(inner.scalar(), 1.5);
    }
}
