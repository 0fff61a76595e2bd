//! Total Generalised Variation
//!
//! Second order TGV regulariser
//! ```math
//! \mathrm{TGV}(u) = \min_w \alpha \|\nabla u - w\|_{2,1} + \beta \|\mathcal{E} w\|_{2,1}
//! ```
//! where $`\mathcal{E}`$ is the symmetrised gradient. It has no closed
//! form proximal operator, so [`TotalGeneralisedVariation`] computes one by
//! running [`Pdhg`] on
//! ```math
//! \min_{u, w} \alpha \|\nabla u - w\|_{2,1} + \beta \|\mathcal{E} w\|_{2,1}
//!     + \frac{1}{2\tau} \|u - x\|_2^2
//! ```
//! with the block operator $`K = \begin{bmatrix} \nabla & -I \\ 0 & \mathcal{E}\end{bmatrix}`$.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use log::debug;
use ndarray::{ArrayD, NdFloat};

use super::{BlockFunction, Function, L2NormSquared, MixedL21Norm, ScaledFunction, ZeroFunction};
use crate::container::{BlockContainer, Container, ImageGeometry};
use crate::error::{Error, Result};
use crate::linop::{
    Backend, BlockOperator, Correlation, GradientOperator, Identity, LinearOperator,
    ScaledOperator, SymmetrisedGradientOperator, ZeroOperator,
};
use crate::prox::Pdhg;

type Image<A> = ArrayD<A>;
type Field<A> = BlockContainer<ArrayD<A>>;

/// `[[grad, -I], [0, symgrad]]` acting on `(u, w)`.
pub type TgvOperator<A> = BlockOperator<
    GradientOperator<A>,
    ScaledOperator<Identity<Field<A>>, A>,
    ZeroOperator<Image<A>, Field<A>>,
    SymmetrisedGradientOperator<A>,
>;

/// `alpha ||.||_{2,1}` on the first dual block, `beta ||.||_{2,1}` on the second.
pub type TgvPenalty<A> =
    BlockFunction<ScaledFunction<MixedL21Norm, A>, ScaledFunction<MixedL21Norm, A>>;

/// `(1 / 2 tau) ||u - x||^2` on `u`, nothing on `w`.
pub type TgvFidelity<A> =
    BlockFunction<ScaledFunction<L2NormSquared<Image<A>>, A>, ZeroFunction<A>>;

type TgvSolver<A> = Pdhg<A, Rc<TgvPenalty<A>>, TgvFidelity<A>, Rc<TgvOperator<A>>>;

/// Settings of the regulariser and its inner solver.
#[derive(Clone, Debug)]
pub struct TgvOptions<A> {
    /// Weight of the first order term.
    pub alpha: A,
    /// Weight of the second order term.
    pub beta: A,
    /// Inner iterations per proximal call.
    pub max_iteration: usize,
    pub correlation: Correlation,
    pub backend: Backend,
    /// Accepted for compatibility; the operator does not depend on it.
    pub split: bool,
    /// Inner solver log level, see [`Pdhg::run`].
    pub verbose: u8,
    /// Objective recording interval of the inner solver; `None` records
    /// only at the first and last iteration.
    pub update_objective_interval: Option<usize>,
    /// Geometry to use instead of the shape of the first input.
    pub domain: Option<ImageGeometry>,
}

impl<A: NdFloat> Default for TgvOptions<A> {
    fn default() -> Self {
        TgvOptions {
            alpha: A::one(),
            beta: A::from(2.).unwrap(),
            max_iteration: 100,
            correlation: Correlation::Space,
            backend: Backend::C,
            split: false,
            verbose: 0,
            update_objective_interval: None,
            domain: None,
        }
    }
}

impl<A: NdFloat> TgvOptions<A> {
    fn validate(&self) -> Result<()> {
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !(value >= A::zero()) || !value.is_finite() {
                return Err(Error::InvalidParameter {
                    parameter: name.into(),
                    message: format!("weight must be non-negative and finite, got {}", value),
                });
            }
        }
        Ok(())
    }
}

/// Where the regulariser is in its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Nothing built yet.
    Unconfigured,
    /// Domain, operator and penalty fixed.
    Configured,
    /// A fidelity term and solver exist for the latest proximal call.
    Ready,
}

/// Parts fixed by the first proximal call.
#[derive(Clone)]
struct Configured<A: NdFloat> {
    domain: ImageGeometry,
    operator: Rc<TgvOperator<A>>,
    /// Estimate of `||operator||`, shared by every inner solver.
    norm: A,
    penalty: Rc<TgvPenalty<A>>,
}

impl<A: NdFloat> Configured<A> {
    fn build(x: &Image<A>, options: &TgvOptions<A>) -> Result<Self> {
        let domain = match &options.domain {
            Some(geometry) => {
                geometry.check(x, "regulariser input")?;
                geometry.clone()
            }
            None => ImageGeometry::from_array(x),
        };
        debug!(
            "TGV: building operator on {:?} (correlation {}, backend {}, split {})",
            domain.shape(),
            options.correlation,
            options.backend,
            options.split
        );

        let gradient = GradientOperator::new(&domain, options.correlation, options.backend)?;
        let symmetrised = SymmetrisedGradientOperator::for_gradient(&gradient, options.backend)?;
        let field = gradient.range_allocate();
        let operator = BlockOperator::new(
            gradient.clone(),
            ScaledOperator::new(Identity::new(&field), -A::one()),
            ZeroOperator::new(&gradient.domain_allocate(), &symmetrised.range_allocate()),
            symmetrised,
        )?;
        let norm = operator.norm()?;
        debug!("TGV: operator norm estimate {:.6e}", norm);
        let penalty = BlockFunction::new(
            ScaledFunction::new(MixedL21Norm, options.alpha),
            ScaledFunction::new(MixedL21Norm, options.beta),
        );
        Ok(Configured {
            domain,
            operator: Rc::new(operator),
            norm,
            penalty: Rc::new(penalty),
        })
    }
}

enum Lifecycle<A: NdFloat> {
    Unconfigured,
    Configured(Configured<A>),
    Ready {
        configured: Configured<A>,
        solver: TgvSolver<A>,
    },
}

impl<A: NdFloat> Lifecycle<A> {
    fn stage(&self) -> Stage {
        match self {
            Lifecycle::Unconfigured => Stage::Unconfigured,
            Lifecycle::Configured(_) => Stage::Configured,
            Lifecycle::Ready { .. } => Stage::Ready,
        }
    }

    fn configured(&self) -> Option<&Configured<A>> {
        match self {
            Lifecycle::Unconfigured => None,
            Lifecycle::Configured(configured) | Lifecycle::Ready { configured, .. } => {
                Some(configured)
            }
        }
    }

    fn solver(&self) -> Option<&TgvSolver<A>> {
        match self {
            Lifecycle::Ready { solver, .. } => Some(solver),
            _ => None,
        }
    }

    /// Unconfigured -> Configured. Later calls keep the built parts and
    /// only check `x` against the fixed domain.
    fn configure(&mut self, x: &Image<A>, options: &TgvOptions<A>) -> Result<()> {
        match self.configured() {
            Some(configured) => configured.domain.check(x, "regulariser input"),
            None => {
                *self = Lifecycle::Configured(Configured::build(x, options)?);
                Ok(())
            }
        }
    }

    /// Configured | Ready -> Ready, with a fidelity term for `(x, tau)` and
    /// a solver starting from iteration zero.
    fn prepare(&mut self, x: &Image<A>, tau: A, options: &TgvOptions<A>) -> Result<()> {
        let configured = self.configured().cloned().ok_or_else(|| Error::Solver {
            context: "regulariser prepared before it was configured".into(),
        })?;
        let half = A::from(0.5).unwrap();
        let fidelity = BlockFunction::new(
            ScaledFunction::new(L2NormSquared::centered(x.clone()), half / tau),
            ZeroFunction::new(),
        );
        let solver = Pdhg::with_norm(
            Rc::clone(&configured.penalty),
            fidelity,
            Rc::clone(&configured.operator),
            configured.norm,
            options.max_iteration,
            options
                .update_objective_interval
                .unwrap_or(options.max_iteration),
        )?;
        *self = Lifecycle::Ready { configured, solver };
        Ok(())
    }

    /// Ready -> Ready, running the solver to its iteration budget.
    fn run(&mut self, verbose: u8) -> Result<()> {
        match self {
            Lifecycle::Ready { solver, .. } => solver.run(verbose),
            _ => Err(Error::Solver {
                context: "regulariser run before it was prepared".into(),
            }),
        }
    }
}

/// Second order Total Generalised Variation regulariser on images.
///
/// The first proximal call fixes the domain, operator and penalty; every
/// call then builds a new fidelity term and solves from scratch. The
/// lifecycle lives in a [`RefCell`], so one instance must not be used from
/// several threads or re-entrantly.
pub struct TotalGeneralisedVariation<A: NdFloat> {
    options: TgvOptions<A>,
    lifecycle: RefCell<Lifecycle<A>>,
}

impl<A: NdFloat> TotalGeneralisedVariation<A> {
    pub fn new(options: TgvOptions<A>) -> Result<Self> {
        options.validate()?;
        Ok(TotalGeneralisedVariation {
            options,
            lifecycle: RefCell::new(Lifecycle::Unconfigured),
        })
    }

    /// Default options with the given weights.
    pub fn with_weights(alpha: A, beta: A) -> Result<Self> {
        Self::new(TgvOptions {
            alpha,
            beta,
            ..TgvOptions::default()
        })
    }

    pub fn options(&self) -> &TgvOptions<A> {
        &self.options
    }

    pub fn alpha(&self) -> A {
        self.options.alpha
    }

    pub fn beta(&self) -> A {
        self.options.beta
    }

    pub fn stage(&self) -> Stage {
        self.lifecycle.borrow().stage()
    }

    /// The block operator, once configured.
    pub fn operator(&self) -> Option<Rc<TgvOperator<A>>> {
        let lifecycle = self.lifecycle.borrow();
        lifecycle.configured().map(|c| Rc::clone(&c.operator))
    }

    /// Estimate of the block operator norm, once configured. It is
    /// computed once and reused by every proximal call.
    pub fn operator_norm(&self) -> Option<A> {
        self.lifecycle.borrow().configured().map(|c| c.norm)
    }

    /// The separable penalty, once configured.
    pub fn penalty(&self) -> Option<Rc<TgvPenalty<A>>> {
        let lifecycle = self.lifecycle.borrow();
        lifecycle.configured().map(|c| Rc::clone(&c.penalty))
    }

    /// Iterations run by the inner solver during the last proximal call.
    pub fn last_iterations(&self) -> Option<usize> {
        self.lifecycle.borrow().solver().map(|s| s.iteration())
    }

    /// `(sigma, tau)` of the inner solver from the last proximal call.
    pub fn last_step_sizes(&self) -> Option<(A, A)> {
        self.lifecycle.borrow().solver().map(|s| s.step_sizes())
    }

    /// Objective trace of the inner solver from the last proximal call.
    pub fn last_objective(&self) -> Option<Vec<A>> {
        self.lifecycle
            .borrow()
            .solver()
            .map(|s| s.objective().to_vec())
    }

    /// Auxiliary field `w` from the last proximal call.
    pub fn last_field(&self) -> Option<Ref<'_, Field<A>>> {
        Ref::filter_map(self.lifecycle.borrow(), |l| {
            l.solver().map(|solver| &solver.solution().1)
        })
        .ok()
    }
}

impl<A: NdFloat> Function<Image<A>> for TotalGeneralisedVariation<A> {
    /// Penalty at the last inner solution, or 0 before any proximal call.
    ///
    /// `x` is not used: the value reported lags one proximal call behind.
    fn call(&self, _x: &Image<A>) -> Result<A> {
        let lifecycle = self.lifecycle.borrow();
        match &*lifecycle {
            Lifecycle::Ready { configured, solver } => {
                let kx = configured.operator.direct(solver.solution())?;
                configured.penalty.call(&kx)
            }
            _ => Ok(A::zero()),
        }
    }

    fn proximal_to(&self, x: &Image<A>, tau: A, out: &mut Image<A>) -> Result<()> {
        x.check_shape(out, "regulariser output")?;
        let mut lifecycle = self.lifecycle.borrow_mut();
        lifecycle.configure(x, &self.options)?;
        lifecycle.prepare(x, tau, &self.options)?;
        lifecycle.run(self.options.verbose)?;
        if let Some(solver) = lifecycle.solver() {
            out.assign(&solver.solution().0);
        }
        Ok(())
    }

    /// No closed form; always 0.
    fn convex_conjugate(&self, _x: &Image<A>) -> Result<A> {
        Ok(A::zero())
    }

    fn domain(&self) -> Option<ImageGeometry> {
        let lifecycle = self.lifecycle.borrow();
        match lifecycle.configured() {
            Some(configured) => Some(configured.domain.clone()),
            None => self.options.domain.clone(),
        }
    }

    fn name(&self) -> &'static str {
        "TotalGeneralisedVariation"
    }
}


#[cfg(all(rustc_nightly, test))]
mod benches {
    use super::*;
    use ndarray::prelude::*;
    use test::Bencher;

    #[bench]
    fn proximal_32x32(bench: &mut Bencher) {
        let tgv = TotalGeneralisedVariation::new(TgvOptions {
            max_iteration: 10,
            ..TgvOptions::default()
        })
        .unwrap();
        let x = Array::from_shape_fn(IxDyn(&[32, 32]), |ix| ((ix[0] * 7 + ix[1] * 3) % 5) as f64);
        bench.iter(|| tgv.proximal(&x, 1.).unwrap());
    }
}
