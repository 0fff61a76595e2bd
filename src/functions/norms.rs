use ndarray::{Array, Dimension, NdFloat, Zip};
use num_traits::Float;

use super::Function;
use crate::container::{BlockContainer, Container};
use crate::error::{Error, Result};

/// `||x - b||_2^2`, or `||x||_2^2` without data.
#[derive(Clone, Debug)]
pub struct L2NormSquared<X> {
    b: Option<X>,
}

impl<X: Container> L2NormSquared<X> {
    pub fn new() -> Self {
        L2NormSquared { b: None }
    }

    /// Squared distance to `b`.
    pub fn centered(b: X) -> Self {
        L2NormSquared { b: Some(b) }
    }

    pub fn data(&self) -> Option<&X> {
        self.b.as_ref()
    }

    fn residual(&self, x: &X) -> Result<X> {
        match &self.b {
            Some(b) => {
                b.check_shape(x, "squared norm data")?;
                Ok(x.subtracted(b))
            }
            None => Ok(x.clone()),
        }
    }
}

impl<X: Container> Default for L2NormSquared<X> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: NdFloat, X: Container<Elem = A>> Function<X> for L2NormSquared<X> {
    fn call(&self, x: &X) -> Result<X::Elem> {
        Ok(self.residual(x)?.squared_norm())
    }

    fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
        x.check_shape(out, "squared norm gradient output")?;
        out.assign(&self.residual(x)?);
        out.scale_mut(A::from(2.).unwrap());
        Ok(())
    }

    /// `(x + 2 tau b) / (1 + 2 tau)`
    fn proximal_to(&self, x: &X, tau: X::Elem, out: &mut X) -> Result<()> {
        x.check_shape(out, "squared norm proximal output")?;
        let two_tau = A::from(2.).unwrap() * tau;
        out.assign(x);
        if let Some(b) = &self.b {
            b.check_shape(x, "squared norm data")?;
            out.scaled_add(two_tau, b);
        }
        out.scale_mut(A::one() / (A::one() + two_tau));
        Ok(())
    }

    /// `||x||^2 / 4 + <x, b>`
    fn convex_conjugate(&self, x: &X) -> Result<X::Elem> {
        let quarter = A::from(0.25).unwrap();
        let shift = match &self.b {
            Some(b) => {
                b.check_shape(x, "squared norm data")?;
                x.dot(b)
            }
            None => A::zero(),
        };
        Ok(quarter * x.squared_norm() + shift)
    }

    fn lipschitz(&self) -> Option<X::Elem> {
        A::from(2.)
    }

    fn name(&self) -> &'static str {
        "L2NormSquared"
    }
}

/// Mixed `(2,1)` norm of a field of arrays: the Euclidean norm across
/// blocks at each point, summed over points.
///
/// ```math
/// \|y\|_{2,1} = \sum_p \Big(\sum_k y_k(p)^2\Big)^{1/2}
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MixedL21Norm;

/// Slack accepted by the conjugate's unit-ball test.
pub const MIXED_NORM_TOLERANCE: f64 = 1e-5;

impl MixedL21Norm {
    /// Euclidean norm across blocks at every point.
    pub fn pointwise_norm<A, D>(x: &BlockContainer<Array<A, D>>) -> Result<Array<A, D>>
    where
        A: NdFloat,
        D: Dimension,
    {
        let first = x.iter().next().ok_or_else(|| Error::InvalidParameter {
            parameter: "field".into(),
            message: "mixed norm of an empty field".into(),
        })?;
        let mut acc = first.zeros_like();
        for block in x.iter() {
            first.check_shape(block, "mixed norm block")?;
            Zip::from(&mut acc).and(block).for_each(|a, &v| *a = *a + v * v);
        }
        acc.mapv_inplace(Float::sqrt);
        Ok(acc)
    }
}

impl<A, D> Function<BlockContainer<Array<A, D>>> for MixedL21Norm
where
    A: NdFloat,
    D: Dimension,
{
    fn call(&self, x: &BlockContainer<Array<A, D>>) -> Result<A> {
        Ok(Self::pointwise_norm(x)?.sum())
    }

    /// Block soft-shrinkage: `x_k * max(0, 1 - tau / |x|)` pointwise.
    fn proximal_to(
        &self,
        x: &BlockContainer<Array<A, D>>,
        tau: A,
        out: &mut BlockContainer<Array<A, D>>,
    ) -> Result<()> {
        x.check_shape(out, "mixed norm proximal output")?;
        let mut factor = Self::pointwise_norm(x)?;
        factor.mapv_inplace(|n| {
            if n > A::zero() {
                Float::max(A::zero(), A::one() - tau / n)
            } else {
                A::zero()
            }
        });
        for (o, block) in out.iter_mut().zip(x.iter()) {
            Zip::from(o)
                .and(block)
                .and(&factor)
                .for_each(|o, &v, &s| *o = v * s);
        }
        Ok(())
    }

    /// Indicator of the unit ball of the dual `(2, inf)` norm.
    fn convex_conjugate(&self, x: &BlockContainer<Array<A, D>>) -> Result<A> {
        let largest = Self::pointwise_norm(x)?.fold(A::zero(), |m, &v| Float::max(m, v));
        let tolerance = A::from(MIXED_NORM_TOLERANCE).unwrap();
        if largest - A::one() <= tolerance {
            Ok(A::zero())
        } else {
            Ok(A::infinity())
        }
    }

    fn name(&self) -> &'static str {
        "MixedL21Norm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::tests::{assert_moreau, random_vector};
    use crate::functions::ScaledFunction;
    use approx::assert_abs_diff_eq;
    use ndarray::prelude::*;

    #[test]
    fn squared_norm_with_data() {
        let b = array![1., 2., 3.];
        let f = L2NormSquared::centered(b.clone());
        let x = array![0., 2., 5.];
        assert_abs_diff_eq!(f.call(&x).unwrap(), 5.);
        assert_abs_diff_eq!(f.gradient(&x).unwrap(), array![-2., 0., 4.]);
        // (x + 2 b) / 3 at tau = 1
        assert_abs_diff_eq!(f.proximal(&x, 1.).unwrap(), array![2. / 3., 2., 11. / 3.]);
        assert_abs_diff_eq!(f.convex_conjugate(&x).unwrap(), 29. / 4. + 19.);
        assert_eq!(f.lipschitz(), Some(2.));
        let x = random_vector(3, 4);
        assert_moreau(&f, &x, 0.4);
        assert!(f.call(&array![1., 2.]).is_err());
    }

    #[test]
    fn prox_minimises_the_model() {
        // the proximal point beats nearby points on 1/2|z-x|^2 + tau f(z)
        let b = random_vector(4, 31);
        let x = random_vector(4, 32);
        let f = L2NormSquared::centered(b);
        let tau = 0.9;
        let model =
            |z: &Array1<f64>| 0.5 * (z - &x).mapv(|v| v * v).sum() + tau * f.call(z).unwrap();
        let p = f.proximal(&x, tau).unwrap();
        for k in 0..4 {
            let mut z = p.clone();
            z[k] += 1e-3;
            assert!(model(&p) < model(&z));
        }
    }

    #[test]
    fn mixed_norm_value_and_shrinkage() {
        let y = BlockContainer::new(vec![array![3., 0., 0.6], array![4., 0., 0.8]]);
        assert_abs_diff_eq!(MixedL21Norm.call(&y).unwrap(), 6.);

        let p = MixedL21Norm.proximal(&y, 2.).unwrap();
        let expected = BlockContainer::new(vec![array![1.8, 0., 0.], array![2.4, 0., 0.]]);
        assert_abs_diff_eq!(p, expected, epsilon = 1e-12);
    }

    #[test]
    fn mixed_norm_conjugate_is_a_ball_indicator() {
        let inside = BlockContainer::new(vec![array![0.6, 0.], array![0.8, 0.5]]);
        let outside = BlockContainer::new(vec![array![0.6, 2.], array![0.8, 0.]]);
        assert_eq!(MixedL21Norm.convex_conjugate(&inside).unwrap(), 0.);
        assert!(MixedL21Norm.convex_conjugate(&outside).unwrap().is_infinite());

        // Moreau: the conjugate prox projects onto the ball of radius alpha
        let f = ScaledFunction::new(MixedL21Norm, 0.5);
        let q = f.proximal_conjugate(&outside, 0.3).unwrap();
        let n = MixedL21Norm::pointwise_norm(&q).unwrap();
        assert!(n.iter().all(|&v| v <= 0.5 + 1e-12));
        assert_abs_diff_eq!(q[0][0], 0.6 * 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(q[0][1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn empty_field_is_rejected() {
        let y: BlockContainer<Array1<f64>> = BlockContainer::new(vec![]);
        assert!(MixedL21Norm.call(&y).is_err());
    }
}
