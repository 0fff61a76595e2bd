//! Primal-Dual Hybrid Gradient

use log::{debug, info};
use ndarray::NdFloat;
use num_traits::Float;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::functions::Function;
use crate::linop::LinearOperator;

/// Default steps are this fraction of `1/||K||`, so that
/// `sigma * tau * ||K||^2 < 1` holds even when `||K||` is a power method
/// estimate.
pub const STEP_FRACTION: f64 = 0.95;

/// Primal-Dual Hybrid Gradient (Chambolle-Pock) for
/// ```math
/// \min_x f(Kx) + g(x)
/// ```
/// with both `f` and `g` prox-friendly. Each step is
/// ```math
/// \begin{aligned}
/// y_{k+1} &= \operatorname{prox}_{\sigma f^*}(y_k + \sigma K \bar x_k) \\
/// x_{k+1} &= \operatorname{prox}_{\tau g}(x_k - \tau K^* y_{k+1}) \\
/// \bar x_{k+1} &= x_{k+1} + \theta (x_{k+1} - x_k)
/// \end{aligned}
/// ```
/// starting from zero, with $`\theta = 1`$ and
/// $`\sigma = \tau = c/\|K\|`$ for `c =` [`STEP_FRACTION`].
pub struct Pdhg<A, F, G, K>
where
    A: NdFloat,
    K: LinearOperator<A>,
{
    f: F,
    g: G,
    operator: K,
    sigma: A,
    tau: A,
    theta: A,

    x: K::Domain,
    x_old: K::Domain,
    x_bar: K::Domain,
    x_tmp: K::Domain,
    y: K::Range,
    y_tmp: K::Range,

    iteration: usize,
    max_iteration: usize,
    update_objective_interval: usize,
    objective: Vec<A>,
    dual_objective: Vec<A>,
}

impl<A, F, G, K> Pdhg<A, F, G, K>
where
    A: NdFloat,
    F: Function<K::Range>,
    G: Function<K::Domain>,
    K: LinearOperator<A>,
{
    /// Set up the solver. `update_objective_interval == 0` disables the
    /// objective history.
    pub fn new(
        f: F,
        g: G,
        operator: K,
        max_iteration: usize,
        update_objective_interval: usize,
    ) -> Result<Self> {
        let norm = operator.norm()?;
        Self::with_norm(f, g, operator, norm, max_iteration, update_objective_interval)
    }

    /// Set up the solver from a known `||K||`, skipping the estimate.
    pub fn with_norm(
        f: F,
        g: G,
        operator: K,
        norm: A,
        max_iteration: usize,
        update_objective_interval: usize,
    ) -> Result<Self> {
        if !(norm > A::zero()) || !Float::is_finite(norm) {
            return Err(Error::Solver {
                context: format!("operator norm must be positive and finite, got {}", norm),
            });
        }
        let step = A::from(STEP_FRACTION).unwrap() / norm;
        let x = operator.domain_allocate();
        let y = operator.range_allocate();
        Ok(Pdhg {
            f,
            g,
            sigma: step,
            tau: step,
            theta: A::one(),
            x_old: x.clone(),
            x_bar: x.clone(),
            x_tmp: x.clone(),
            x,
            y_tmp: y.clone(),
            y,
            operator,
            iteration: 0,
            max_iteration,
            update_objective_interval,
            objective: Vec::new(),
            dual_objective: Vec::new(),
        })
    }

    /// Replace the default step sizes.
    pub fn with_step_sizes(mut self, sigma: A, tau: A) -> Result<Self> {
        for (name, value) in [("sigma", sigma), ("tau", tau)] {
            if !(value > A::zero()) || !Float::is_finite(value) {
                return Err(Error::InvalidParameter {
                    parameter: name.into(),
                    message: format!("step size must be positive and finite, got {}", value),
                });
            }
        }
        self.sigma = sigma;
        self.tau = tau;
        Ok(self)
    }

    /// One primal-dual update.
    pub fn step(&mut self) -> Result<()> {
        // dual ascent on the conjugate of f
        self.operator.direct_to(&self.x_bar, &mut self.y_tmp)?;
        self.y_tmp.scale_mut(self.sigma);
        self.y_tmp.add_assign_from(&self.y);
        self.f
            .proximal_conjugate_to(&self.y_tmp, self.sigma, &mut self.y)?;

        // primal descent on g
        self.x_old.assign(&self.x);
        self.operator.adjoint_to(&self.y, &mut self.x_tmp)?;
        self.x_tmp.scale_mut(-self.tau);
        self.x_tmp.add_assign_from(&self.x_old);
        self.g.proximal_to(&self.x_tmp, self.tau, &mut self.x)?;

        // over-relaxation
        self.x_bar.assign(&self.x);
        self.x_bar.scaled_add(self.theta, &self.x);
        self.x_bar.scaled_add(-self.theta, &self.x_old);

        self.iteration += 1;
        Ok(())
    }

    /// Iterate until `max_iteration`. `verbose` 1 logs a summary at
    /// `info`, 2 also logs every recorded objective.
    pub fn run(&mut self, verbose: u8) -> Result<()> {
        if verbose >= 1 {
            info!(
                "PDHG: {} iterations, sigma {:.3e}, tau {:.3e}",
                self.max_iteration - self.iteration.min(self.max_iteration),
                self.sigma,
                self.tau
            );
        }
        if self.iteration == 0 && self.should_record() {
            self.update_objective(verbose)?;
        }
        while self.iteration < self.max_iteration {
            self.step()?;
            if self.should_record() {
                self.update_objective(verbose)?;
            }
        }
        if verbose >= 1 {
            match self.objective.last() {
                Some(obj) => info!(
                    "PDHG: finished at iteration {}, objective {:.6e}",
                    self.iteration, obj
                ),
                None => info!("PDHG: finished at iteration {}", self.iteration),
            }
        }
        Ok(())
    }

    fn should_record(&self) -> bool {
        self.update_objective_interval > 0 && self.iteration % self.update_objective_interval == 0
    }

    /// Record the primal objective `f(Kx) + g(x)` and the dual objective
    /// `-f^*(y) - g^*(-K^*y)`.
    pub fn update_objective(&mut self, verbose: u8) -> Result<()> {
        let kx = self.operator.direct(&self.x)?;
        let primal = self.f.call(&kx)? + self.g.call(&self.x)?;
        let mut kty = self.operator.adjoint(&self.y)?;
        kty.scale_mut(-A::one());
        let dual = -(self.f.convex_conjugate(&self.y)? + self.g.convex_conjugate(&kty)?);
        if verbose >= 2 {
            info!("{:>6}: primal {:.6e} dual {:.6e}", self.iteration, primal, dual);
        } else {
            debug!("{:>6}: primal {:.6e} dual {:.6e}", self.iteration, primal, dual);
        }
        self.objective.push(primal);
        self.dual_objective.push(dual);
        Ok(())
    }

    pub fn solution(&self) -> &K::Domain {
        &self.x
    }

    pub fn dual_solution(&self) -> &K::Range {
        &self.y
    }

    pub fn into_solution(self) -> K::Domain {
        self.x
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn max_iteration(&self) -> usize {
        self.max_iteration
    }

    pub fn step_sizes(&self) -> (A, A) {
        (self.sigma, self.tau)
    }

    /// Recorded primal objective values.
    pub fn objective(&self) -> &[A] {
        &self.objective
    }

    pub fn dual_objective(&self) -> &[A] {
        &self.dual_objective
    }

    /// Last recorded primal-dual gap.
    pub fn primal_dual_gap(&self) -> Option<A> {
        Some(*self.objective.last()? - *self.dual_objective.last()?)
    }

    pub fn operator(&self) -> &K {
        &self.operator
    }

    pub fn f(&self) -> &F {
        &self.f
    }

    pub fn g(&self) -> &G {
        &self.g
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{BlockContainer, ImageGeometry};
    use crate::functions::{L2NormSquared, MixedL21Norm, ScaledFunction, ZeroFunction};
    use crate::linop::{Backend, Correlation, GradientOperator, Identity, ZeroOperator};
    use approx::assert_abs_diff_eq;
    use ndarray::prelude::*;
    use std::cell::Cell;

    /// Counts how often the norm is asked for.
    struct CountingNorm<K> {
        inner: K,
        calls: Cell<usize>,
    }

    impl<K: LinearOperator<f64>> LinearOperator<f64> for &CountingNorm<K> {
        type Domain = K::Domain;
        type Range = K::Range;

        fn direct_to(&self, x: &K::Domain, out: &mut K::Range) -> Result<()> {
            self.inner.direct_to(x, out)
        }

        fn adjoint_to(&self, y: &K::Range, out: &mut K::Domain) -> Result<()> {
            self.inner.adjoint_to(y, out)
        }

        fn domain_allocate(&self) -> K::Domain {
            self.inner.domain_allocate()
        }

        fn range_allocate(&self) -> K::Range {
            self.inner.range_allocate()
        }

        fn norm(&self) -> Result<f64> {
            self.calls.set(self.calls.get() + 1);
            self.inner.norm()
        }
    }

    #[test]
    fn identity_least_squares() {
        // min ||x - b||^2 with K = I, g = 0
        let b = array![1., -2., 0.5, 3.];
        let K = Identity::new(&b);
        let f = L2NormSquared::centered(b.clone());
        let mut pdhg = Pdhg::new(f, ZeroFunction::new(), K, 200, 50).unwrap();
        assert_eq!(pdhg.step_sizes(), (STEP_FRACTION, STEP_FRACTION));
        pdhg.run(0).unwrap();
        assert_eq!(pdhg.iteration(), 200);
        assert_abs_diff_eq!(*pdhg.solution(), b, epsilon = 1e-8);
        assert_eq!(pdhg.objective().len(), 5);
        assert_abs_diff_eq!(*pdhg.objective().last().unwrap(), 0., epsilon = 1e-12);
        assert_abs_diff_eq!(pdhg.primal_dual_gap().unwrap(), 0., epsilon = 1e-8);
    }

    #[test]
    fn denoise_with_total_variation() {
        // min ||Du||_1 + 1/(2 tau) ||u - b||^2 on a noisy step
        let b: ArrayD<f64> = array![0., 0.1, -0.1, 0., 1., 1.1, 0.9, 1.].into_dyn();
        let geometry = ImageGeometry::from_array(&b);
        let D = GradientOperator::new(&geometry, Correlation::Space, Backend::C).unwrap();
        let f = ScaledFunction::new(MixedL21Norm, 0.1);
        let g = ScaledFunction::new(L2NormSquared::centered(b.clone()), 0.5);
        let mut pdhg = Pdhg::new(f, g, D, 500, 0).unwrap();
        pdhg.run(0).unwrap();
        assert!(pdhg.objective().is_empty());

        let u = pdhg.solution();
        let tv = |v: &ArrayD<f64>| {
            v.as_slice()
                .unwrap()
                .windows(2)
                .map(|w| (w[1] - w[0]).abs())
                .sum::<f64>()
        };
        assert!(tv(u) < tv(&b));
        // the mean survives denoising
        assert_abs_diff_eq!(u.sum(), b.sum(), epsilon = 1e-6);
        // and the step is kept
        let s = u.as_slice().unwrap();
        assert!(s[5] - s[2] > 0.7);
    }

    #[test]
    fn zero_operator_is_rejected() {
        let x = array![1., 2.];
        let y = BlockContainer::new(vec![array![0., 0.]]);
        let res = Pdhg::new(MixedL21Norm, ZeroFunction::new(), ZeroOperator::new(&x, &y), 10, 1);
        assert!(matches!(res, Err(Error::Solver { .. })));
    }

    #[test]
    fn custom_steps_are_validated() {
        let b = array![1., 2.];
        let f = L2NormSquared::centered(b.clone());
        let pdhg = Pdhg::new(f, ZeroFunction::new(), Identity::new(&b), 1, 1).unwrap();
        assert!(pdhg.with_step_sizes(0., 1.).is_err());
    }

    #[test]
    fn known_norm_skips_the_estimate() {
        let b: ArrayD<f64> = array![0., 1., 3., 2., 2.].into_dyn();
        let geometry = ImageGeometry::from_array(&b);
        let K = CountingNorm {
            inner: GradientOperator::new(&geometry, Correlation::Space, Backend::C).unwrap(),
            calls: Cell::new(0),
        };
        let make_g = || ScaledFunction::new(L2NormSquared::centered(b.clone()), 0.5);

        let estimated = Pdhg::new(MixedL21Norm, make_g(), &K, 3, 0).unwrap();
        assert_eq!(K.calls.get(), 1);
        let norm = K.inner.norm().unwrap();
        let mut known = Pdhg::with_norm(MixedL21Norm, make_g(), &K, norm, 3, 0).unwrap();
        let mut again = Pdhg::with_norm(MixedL21Norm, make_g(), &K, norm, 3, 0).unwrap();
        assert_eq!(K.calls.get(), 1);
        assert_eq!(known.step_sizes(), estimated.step_sizes());

        known.run(0).unwrap();
        again.run(0).unwrap();
        assert_eq!(known.solution(), again.solution());
        assert_eq!(K.calls.get(), 1);

        for &bad in &[0., -1., f64::NAN] {
            let res = Pdhg::with_norm(MixedL21Norm, make_g(), &K, bad, 3, 0);
            assert!(matches!(res, Err(Error::Solver { .. })));
        }
    }
}
