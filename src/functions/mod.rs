//! Convex Functions and their Algebra
//!
//! A [`Function`] knows how to evaluate itself at a point of a
//! [`Container`] and, where a closed form exists, its gradient, its
//! proximal operator
//! ```math
//! \operatorname{prox}_{\tau F}(x) = \arg\min_z \tfrac12 \|z - x\|_2^2 + \tau F(z)
//! ```
//! and its convex conjugate $`F^*`$. Every function also gets the proximal
//! operator of its conjugate for free from Moreau's identity
//! ```math
//! \operatorname{prox}_{\tau F^*}(x) = x - \tau \operatorname{prox}_{F/\tau}(x/\tau)
//! ```
//!
//! Functions combine through the combinators in this module
//! ([`SumFunction`], [`SumFunctionScalar`], [`ScaledFunction`],
//! [`TranslateFunction`]), either statically through their constructors or
//! dynamically on boxed functions through [`algebra`].

use std::rc::Rc;

use num_traits::One;

use crate::container::{Container, ImageGeometry};
use crate::error::{Error, Result};

pub mod algebra;
pub use algebra::{boxed, BoxedFunction, Operand};
mod block;
pub use block::*;
pub mod compat;
mod constant;
pub use constant::*;
mod norms;
pub use norms::*;
mod scaled;
pub use scaled::*;
mod sum;
pub use sum::*;
pub mod tgv;
pub use tgv::{Stage, TgvOptions, TotalGeneralisedVariation};
mod translate;
pub use translate::*;

/// A convex function on the container space `X`.
///
/// In-place methods (`*_to`) write their result into `out`, which must
/// have the shape of the input. The allocating forms are provided in
/// terms of them. `out` must not alias `x`.
pub trait Function<X: Container> {
    /// Value of the function at `x`.
    fn call(&self, x: &X) -> Result<X::Elem>;

    /// Gradient at `x`, written into `out`.
    fn gradient_to(&self, _x: &X, _out: &mut X) -> Result<()> {
        Err(Error::not_implemented(self.name(), "gradient"))
    }

    /// Proximal operator with step `tau > 0`, written into `out`.
    fn proximal_to(&self, _x: &X, _tau: X::Elem, _out: &mut X) -> Result<()> {
        Err(Error::not_implemented(self.name(), "proximal"))
    }

    fn convex_conjugate(&self, _x: &X) -> Result<X::Elem> {
        Err(Error::not_implemented(self.name(), "convex_conjugate"))
    }

    /// Lipschitz constant of the gradient, if one is known.
    fn lipschitz(&self) -> Option<X::Elem> {
        None
    }

    /// Geometry the function is defined on, if it fixes one.
    fn domain(&self) -> Option<ImageGeometry> {
        None
    }

    /// Short name used in error messages.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn gradient(&self, x: &X) -> Result<X> {
        let mut out = x.zeros_like();
        self.gradient_to(x, &mut out)?;
        Ok(out)
    }

    fn proximal(&self, x: &X, tau: X::Elem) -> Result<X> {
        let mut out = x.zeros_like();
        self.proximal_to(x, tau, &mut out)?;
        Ok(out)
    }

    /// Proximal operator of the convex conjugate, by Moreau's identity.
    fn proximal_conjugate_to(&self, x: &X, tau: X::Elem, out: &mut X) -> Result<()> {
        let inv_tau = X::Elem::one() / tau;
        self.proximal_to(&x.scaled(inv_tau), inv_tau, out)?;
        out.scale_mut(-tau);
        out.add_assign_from(x);
        Ok(())
    }

    fn proximal_conjugate(&self, x: &X, tau: X::Elem) -> Result<X> {
        let mut out = x.zeros_like();
        self.proximal_conjugate_to(x, tau, &mut out)?;
        Ok(out)
    }
}

macro_rules! forward_function {
    ($ptr:ty) => {
        impl<X, F> Function<X> for $ptr
        where
            X: Container,
            F: Function<X> + ?Sized,
        {
            fn call(&self, x: &X) -> Result<X::Elem> {
                (**self).call(x)
            }

            fn gradient_to(&self, x: &X, out: &mut X) -> Result<()> {
                (**self).gradient_to(x, out)
            }

            fn proximal_to(&self, x: &X, tau: X::Elem, out: &mut X) -> Result<()> {
                (**self).proximal_to(x, tau, out)
            }

            fn convex_conjugate(&self, x: &X) -> Result<X::Elem> {
                (**self).convex_conjugate(x)
            }

            fn lipschitz(&self) -> Option<X::Elem> {
                (**self).lipschitz()
            }

            fn domain(&self) -> Option<ImageGeometry> {
                (**self).domain()
            }

            fn name(&self) -> &'static str {
                (**self).name()
            }

            fn proximal_conjugate_to(&self, x: &X, tau: X::Elem, out: &mut X) -> Result<()> {
                (**self).proximal_conjugate_to(x, tau, out)
            }
        }
    };
}

forward_function!(Box<F>);
forward_function!(Rc<F>);
forward_function!(&F);
