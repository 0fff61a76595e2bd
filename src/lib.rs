//! The `ndarray-prox` crate provides composable convex functions on
//! `ndarray`s for proximal and primal-dual optimization.
//!
//! It includes:
//! - a [`Function`](functions::Function) trait with gradients, proximal
//!   operators and convex conjugates, and the proximal operator of the
//!   conjugate for free through Moreau's identity
//! - combinators for sums, scaling, translation and constants, usable
//!   statically or at run time through [`functions::algebra`]
//! - a Total Generalised Variation regulariser whose proximal operator is
//!   computed by a nested primal-dual solve
//! - gradient, symmetrised gradient and block linear operators
//! - FISTA and PDHG
//!
//! Functions act on any [`Container`](container::Container): plain arrays,
//! fields of arrays ([`BlockContainer`](container::BlockContainer)) and
//! pairs of those.
//!
//! This crate is in the early development stage and is actively changing.

#![cfg_attr(all(rustc_nightly, test), feature(test))]
#[cfg(all(rustc_nightly, test))]
extern crate test;

pub mod container;
pub mod error;
pub mod functions;
pub mod linop;
pub mod prox;

pub use error::{Error, Result};
