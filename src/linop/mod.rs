//! Abstract Linear Operators and Adjoints
//!
//! A [`LinearOperator`] maps a domain [`Container`] to a range container
//! and knows its adjoint. Operators compose into 2x2 block matrices with
//! [`BlockOperator`], which is how the regulariser in
//! [`crate::functions::tgv`] couples an image with an auxiliary field.

use std::rc::Rc;

use ndarray::NdFloat;
use num_traits::Float;

use crate::container::Container;
use crate::error::Result;

mod block;
pub use block::*;
mod gradient;
pub use gradient::*;

/// Iterations of the power method used by [`LinearOperator::norm`].
pub const POWER_ITERATIONS: usize = 100;

pub trait LinearOperator<A: NdFloat> {
    type Domain: Container<Elem = A>;
    type Range: Container<Elem = A>;

    /// Apply operator, writing into `out`
    fn direct_to(&self, x: &Self::Domain, out: &mut Self::Range) -> Result<()>;

    /// Apply adjoint, writing into `out`
    fn adjoint_to(&self, y: &Self::Range, out: &mut Self::Domain) -> Result<()>;

    /// A zero element of the domain.
    fn domain_allocate(&self) -> Self::Domain;

    /// A zero element of the range.
    fn range_allocate(&self) -> Self::Range;

    /// Apply operator out-place
    fn direct(&self, x: &Self::Domain) -> Result<Self::Range> {
        let mut out = self.range_allocate();
        self.direct_to(x, &mut out)?;
        Ok(out)
    }

    /// Apply adjoint out-place
    fn adjoint(&self, y: &Self::Range) -> Result<Self::Domain> {
        let mut out = self.domain_allocate();
        self.adjoint_to(y, &mut out)?;
        Ok(out)
    }

    /// Operator 2-norm estimated with the power method on $`K^*K`$.
    fn norm(&self) -> Result<A> {
        power_method(self, POWER_ITERATIONS, A::from(1e-6).unwrap())
    }
}

/// Largest singular value of `op` by power iteration
///
/// The estimate approaches the norm from below.
/// The start vector is a fixed, non-constant sequence so results are
/// reproducible and do not sit in the null space of difference operators.
pub fn power_method<A, K>(op: &K, max_iteration: usize, tolerance: A) -> Result<A>
where
    A: NdFloat,
    K: LinearOperator<A> + ?Sized,
{
    const GOLDEN: f64 = 0.618_033_988_749_895;

    let mut x = op.domain_allocate();
    let mut k = 0usize;
    x.for_each_mut(&mut |v| {
        k += 1;
        *v = A::from((k as f64 * GOLDEN).fract() - 0.5).unwrap();
    });
    let n0 = x.norm();
    if n0 == A::zero() {
        return Ok(A::zero());
    }
    x.scale_mut(A::one() / n0);

    let mut y = op.range_allocate();
    let mut estimate = A::zero();
    for _iter in 0..max_iteration {
        op.direct_to(&x, &mut y)?;
        op.adjoint_to(&y, &mut x)?;
        let n = x.norm();
        if n == A::zero() {
            return Ok(A::zero());
        }
        x.scale_mut(A::one() / n);

        let previous = estimate;
        estimate = n;
        if Float::abs(estimate - previous) <= tolerance * estimate {
            break;
        }
    }
    Ok(Float::sqrt(estimate))
}

impl<A, K> LinearOperator<A> for Rc<K>
where
    A: NdFloat,
    K: LinearOperator<A> + ?Sized,
{
    type Domain = K::Domain;
    type Range = K::Range;

    fn direct_to(&self, x: &K::Domain, out: &mut K::Range) -> Result<()> {
        (**self).direct_to(x, out)
    }

    fn adjoint_to(&self, y: &K::Range, out: &mut K::Domain) -> Result<()> {
        (**self).adjoint_to(y, out)
    }

    fn domain_allocate(&self) -> K::Domain {
        (**self).domain_allocate()
    }

    fn range_allocate(&self) -> K::Range {
        (**self).range_allocate()
    }

    fn norm(&self) -> Result<A> {
        (**self).norm()
    }
}

/// Identity on the space of `template`.
#[derive(Clone, Debug)]
pub struct Identity<X> {
    space: X,
}

impl<X: Container> Identity<X> {
    #[must_use]
    pub fn new(template: &X) -> Identity<X> {
        Identity {
            space: template.zeros_like(),
        }
    }
}

impl<A, X> LinearOperator<A> for Identity<X>
where
    A: NdFloat,
    X: Container<Elem = A>,
{
    type Domain = X;
    type Range = X;

    fn direct_to(&self, x: &X, out: &mut X) -> Result<()> {
        self.space.check_shape(x, "identity input")?;
        self.space.check_shape(out, "identity output")?;
        out.assign(x);
        Ok(())
    }

    fn adjoint_to(&self, y: &X, out: &mut X) -> Result<()> {
        self.direct_to(y, out)
    }

    fn domain_allocate(&self) -> X {
        self.space.zeros_like()
    }

    fn range_allocate(&self) -> X {
        self.space.zeros_like()
    }

    fn norm(&self) -> Result<A> {
        Ok(A::one())
    }
}

/// Maps every element of the domain to zero in the range.
#[derive(Clone, Debug)]
pub struct ZeroOperator<X, Y> {
    domain: X,
    range: Y,
}

impl<X: Container, Y: Container> ZeroOperator<X, Y> {
    #[must_use]
    pub fn new(domain: &X, range: &Y) -> ZeroOperator<X, Y> {
        ZeroOperator {
            domain: domain.zeros_like(),
            range: range.zeros_like(),
        }
    }
}

impl<A, X, Y> LinearOperator<A> for ZeroOperator<X, Y>
where
    A: NdFloat,
    X: Container<Elem = A>,
    Y: Container<Elem = A>,
{
    type Domain = X;
    type Range = Y;

    fn direct_to(&self, x: &X, out: &mut Y) -> Result<()> {
        self.domain.check_shape(x, "zero operator input")?;
        self.range.check_shape(out, "zero operator output")?;
        out.set_zero();
        Ok(())
    }

    fn adjoint_to(&self, y: &Y, out: &mut X) -> Result<()> {
        self.range.check_shape(y, "zero operator adjoint input")?;
        self.domain.check_shape(out, "zero operator adjoint output")?;
        out.set_zero();
        Ok(())
    }

    fn domain_allocate(&self) -> X {
        self.domain.zeros_like()
    }

    fn range_allocate(&self) -> Y {
        self.range.zeros_like()
    }

    fn norm(&self) -> Result<A> {
        Ok(A::zero())
    }
}

/// `scalar * K`
#[derive(Clone, Debug)]
pub struct ScaledOperator<K, A> {
    operator: K,
    scalar: A,
}

impl<K, A> ScaledOperator<K, A> {
    #[must_use]
    pub fn new(operator: K, scalar: A) -> ScaledOperator<K, A> {
        ScaledOperator { operator, scalar }
    }
}

impl<A, K> LinearOperator<A> for ScaledOperator<K, A>
where
    A: NdFloat,
    K: LinearOperator<A>,
{
    type Domain = K::Domain;
    type Range = K::Range;

    fn direct_to(&self, x: &K::Domain, out: &mut K::Range) -> Result<()> {
        self.operator.direct_to(x, out)?;
        out.scale_mut(self.scalar);
        Ok(())
    }

    fn adjoint_to(&self, y: &K::Range, out: &mut K::Domain) -> Result<()> {
        self.operator.adjoint_to(y, out)?;
        out.scale_mut(self.scalar);
        Ok(())
    }

    fn domain_allocate(&self) -> K::Domain {
        self.operator.domain_allocate()
    }

    fn range_allocate(&self) -> K::Range {
        self.operator.range_allocate()
    }

    fn norm(&self) -> Result<A> {
        Ok(Float::abs(self.scalar) * self.operator.norm()?)
    }
}

/// Test whether `<K x, y> == <x, K* y>` for the given pair.
pub fn is_adjoint_pair<A, K>(op: &K, x: &K::Domain, y: &K::Range, tolerance: A) -> Result<bool>
where
    A: NdFloat,
    K: LinearOperator<A> + ?Sized,
{
    let lhs = op.direct(x)?.dot(y);
    let rhs = x.dot(&op.adjoint(y)?);
    let scale = Float::max(A::one(), Float::max(Float::abs(lhs), Float::abs(rhs)));
    Ok(Float::abs(lhs - rhs) <= tolerance * scale)
}
