//! Fast Iterative Shrinking/Thresholding Algorithm

use ndarray::NdFloat;
use num_traits::Float;

use crate::container::Container;
use crate::error::{Error, Result};
use crate::functions::Function;

/// Fast Iterative Shrinking/Thresholding Algorithm
///
/// Minimizes `f(x) + g(x)` for `f` with a known Lipschitz gradient
/// ([`Function::lipschitz`]) and `g` with a proximal operator.
///
/// Parameters
/// ----------
/// __f:__         smooth term, only its gradient is used
/// __g:__         prox-friendly term
/// __x0:__        initial guess
/// __muf:__       strong convexity parameter of `f`, 0 if unknown
/// __maxiter:__   number of iterations
/// __restart:__   use gradient based adaptive restart
/// __callback:__  called with every iterate; returning `true` stops early
pub fn fista<A, X, F, G>(
    f: &F,
    g: &G,
    x0: &X,
    muf: A,
    maxiter: usize,
    restart: bool,
    mut callback: impl FnMut(&X, usize) -> bool,
) -> Result<X>
where
    A: NdFloat,
    X: Container<Elem = A>,
    F: Function<X> + ?Sized,
    G: Function<X> + ?Sized,
{
    #[allow(non_snake_case)]
    let Lf = f.lipschitz().ok_or_else(|| Error::InvalidParameter {
        parameter: "f".into(),
        message: format!("{} has no Lipschitz constant", f.name()),
    })?;
    if !(Lf > A::zero()) || !Float::is_finite(Lf) {
        return Err(Error::InvalidParameter {
            parameter: "f".into(),
            message: format!("Lipschitz constant must be positive and finite, got {}", Lf),
        });
    }

    // sequences/ sets of iterates
    let mut x = x0.clone();
    let mut y = x0.clone();
    let mut z = x0.zeros_like();
    let mut grad = x0.zeros_like();

    let one = A::one();
    let mut theta = one;
    let step = one / Lf;

    let two = A::from(2.).unwrap();
    let four = A::from(4.).unwrap();
    let eight = A::from(8.).unwrap();

    // for the strong convex case
    let q = muf / Lf;
    let beta2 = (two + q - (q.powi(2) + eight * q).sqrt()).powi(2) / four / (one - q);
    let strong = muf > A::zero();

    if callback(&x, 0) {
        return Ok(x);
    }
    for iter in 1..=maxiter {
        // save last iter
        let y_old = y.clone();
        let x_old = x.clone();
        let theta_old = theta;

        // compute constants for this iteration
        theta = (one + (four * theta.powi(2) + one).sqrt()) / two;
        let beta = if strong { beta2 } else { (theta_old - one) / theta }; // "nesterov" momentum

        f.gradient_to(&y, &mut grad)?;
        z.assign(&y);
        z.scaled_add(-step, &grad);
        g.proximal_to(&z, step, &mut x)?;

        // y = x + beta (x - x_old)
        y.assign(&x);
        y.scaled_add(beta, &x);
        y.scaled_add(-beta, &x_old);

        // restart momentum if needed
        if restart {
            // grad - Lf (x - y_old)
            grad.scaled_add(-Lf, &x);
            grad.scaled_add(Lf, &y_old);
            if grad.dot(&x.subtracted(&x_old)) <= A::zero() {
                theta = one
            }
        }

        if callback(&x, iter) {
            break;
        }
    }
    Ok(x)
}
