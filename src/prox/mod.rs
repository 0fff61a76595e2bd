//! Minimization for Composite Functions
//!
//! [`fista`] handles an L-smooth _f_ plus a non-smooth prox-friendly _g_.
//! [`Pdhg`] handles _f(Kx) + g(x)_ with both terms prox-friendly and a
//! linear operator _K_ in between; it is also the inner solver of
//! [`crate::functions::TotalGeneralisedVariation`].

mod fista;
pub use fista::*;

mod pdhg;
pub use pdhg::*;

/// Do nothing function for optional user callback (returns false)
pub fn nop<X>(_x: &X, _itr: usize) -> bool {
    false
}
