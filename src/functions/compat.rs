//! Old method names, kept for callers written against them.

use log::warn;

use super::Function;
use crate::container::Container;
use crate::error::Result;

pub trait DeprecatedAliases<X: Container>: Function<X> {
    #[deprecated(note = "use `Function::gradient`")]
    fn grad(&self, x: &X) -> Result<X> {
        warn!("`grad` is deprecated, use `gradient`");
        self.gradient(x)
    }

    #[deprecated(note = "use `Function::proximal`")]
    fn prox(&self, x: &X, tau: X::Elem) -> Result<X> {
        warn!("`prox` is deprecated, use `proximal`");
        self.proximal(x, tau)
    }
}

impl<X: Container, F: Function<X> + ?Sized> DeprecatedAliases<X> for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::L2NormSquared;
    use ndarray::prelude::*;

    #[test]
    #[allow(deprecated)]
    fn aliases_match_canonical_names() {
        let f = L2NormSquared::centered(array![1., 0.]);
        let x = array![2., 2.];
        assert_eq!(f.grad(&x).unwrap(), f.gradient(&x).unwrap());
        assert_eq!(f.prox(&x, 0.5).unwrap(), f.proximal(&x, 0.5).unwrap());
    }
}
