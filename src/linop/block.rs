use ndarray::NdFloat;

use super::LinearOperator;
use crate::container::Container;
use crate::error::Result;

/// A 2x2 block operator
///
/// ```math
/// K = \begin{bmatrix} K_{11} & K_{12} \\ K_{21} & K_{22} \end{bmatrix},
/// \qquad K \begin{bmatrix} x_1 \\ x_2 \end{bmatrix} =
/// \begin{bmatrix} K_{11}x_1 + K_{12}x_2 \\ K_{21}x_1 + K_{22}x_2 \end{bmatrix}
/// ```
/// acting on pairs `(x1, x2)` and producing pairs `(y1, y2)`.
#[derive(Clone, Debug)]
pub struct BlockOperator<K11, K12, K21, K22> {
    k11: K11,
    k12: K12,
    k21: K21,
    k22: K22,
}

impl<K11, K12, K21, K22> BlockOperator<K11, K12, K21, K22> {
    /// Assemble the block matrix, checking that rows share a range and
    /// columns share a domain.
    pub fn new<A>(k11: K11, k12: K12, k21: K21, k22: K22) -> Result<Self>
    where
        A: NdFloat,
        K11: LinearOperator<A>,
        K12: LinearOperator<A, Range = K11::Range>,
        K21: LinearOperator<A, Domain = K11::Domain>,
        K22: LinearOperator<A, Domain = K12::Domain, Range = K21::Range>,
    {
        k11.domain_allocate()
            .check_shape(&k21.domain_allocate(), "block column 1 domain")?;
        k12.domain_allocate()
            .check_shape(&k22.domain_allocate(), "block column 2 domain")?;
        k11.range_allocate()
            .check_shape(&k12.range_allocate(), "block row 1 range")?;
        k21.range_allocate()
            .check_shape(&k22.range_allocate(), "block row 2 range")?;
        Ok(BlockOperator { k11, k12, k21, k22 })
    }

    pub fn k11(&self) -> &K11 {
        &self.k11
    }

    pub fn k12(&self) -> &K12 {
        &self.k12
    }

    pub fn k21(&self) -> &K21 {
        &self.k21
    }

    pub fn k22(&self) -> &K22 {
        &self.k22
    }
}

impl<A, K11, K12, K21, K22> LinearOperator<A> for BlockOperator<K11, K12, K21, K22>
where
    A: NdFloat,
    K11: LinearOperator<A>,
    K12: LinearOperator<A, Range = K11::Range>,
    K21: LinearOperator<A, Domain = K11::Domain>,
    K22: LinearOperator<A, Domain = K12::Domain, Range = K21::Range>,
{
    type Domain = (K11::Domain, K12::Domain);
    type Range = (K11::Range, K21::Range);

    fn direct_to(&self, x: &Self::Domain, out: &mut Self::Range) -> Result<()> {
        let (x1, x2) = x;
        self.k11.direct_to(x1, &mut out.0)?;
        out.0.add_assign_from(&self.k12.direct(x2)?);
        self.k21.direct_to(x1, &mut out.1)?;
        out.1.add_assign_from(&self.k22.direct(x2)?);
        Ok(())
    }

    fn adjoint_to(&self, y: &Self::Range, out: &mut Self::Domain) -> Result<()> {
        let (y1, y2) = y;
        self.k11.adjoint_to(y1, &mut out.0)?;
        out.0.add_assign_from(&self.k21.adjoint(y2)?);
        self.k12.adjoint_to(y1, &mut out.1)?;
        out.1.add_assign_from(&self.k22.adjoint(y2)?);
        Ok(())
    }

    fn domain_allocate(&self) -> Self::Domain {
        (self.k11.domain_allocate(), self.k12.domain_allocate())
    }

    fn range_allocate(&self) -> Self::Range {
        (self.k11.range_allocate(), self.k21.range_allocate())
    }
}
