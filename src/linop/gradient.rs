//! Finite difference, gradient and symmetrised gradient operators
//!
//! All differences use Neumann boundary conditions and divide by the voxel
//! size of the differentiated axis (channel axes are unit spaced). Adjoints
//! are exact, so $`\langle Kx, y\rangle = \langle x, K^*y\rangle`$ holds to
//! rounding error, which the primal-dual solver relies on.

use std::fmt;
use std::str::FromStr;

use ndarray::prelude::*;
use ndarray::{NdFloat, Slice, Zip};

use super::LinearOperator;
use crate::container::{BlockContainer, Container, ImageGeometry};
use crate::error::{Error, Result};

/// Which axes a gradient couples
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Correlation {
    /// Differentiate along spatial axes only.
    Space,
    /// Differentiate along spatial axes and the channel axis.
    SpaceChannels,
}

impl Default for Correlation {
    fn default() -> Self {
        Correlation::Space
    }
}

impl FromStr for Correlation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Space" => Ok(Correlation::Space),
            "SpaceChannels" => Ok(Correlation::SpaceChannels),
            other => Err(Error::InvalidParameter {
                parameter: "correlation".into(),
                message: format!("expected Space or SpaceChannels, got {:?}", other),
            }),
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Space => write!(f, "Space"),
            Correlation::SpaceChannels => write!(f, "SpaceChannels"),
        }
    }
}

/// How finite differences are computed
///
/// Both backends produce the same values; they differ in memory access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// One fused loop per lane along the differentiated axis (`"c"`).
    C,
    /// Whole-array shifted slice arithmetic (`"numpy"`).
    Numpy,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::C
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "c" => Ok(Backend::C),
            "numpy" => Ok(Backend::Numpy),
            other => Err(Error::InvalidParameter {
                parameter: "backend".into(),
                message: format!("expected c or numpy, got {:?}", other),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::C => write!(f, "c"),
            Backend::Numpy => write!(f, "numpy"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Difference {
    /// $`(Dx)_i = x_{i+1} - x_i`$, zero on the last sample
    Forward,
    /// $`(Dx)_i = x_i - x_{i-1}`$, zero on the first sample
    Backward,
}

/// First order difference along one axis of an image.
#[derive(Clone, Debug)]
pub struct FiniteDifference<A> {
    geometry: ImageGeometry,
    axis: usize,
    method: Difference,
    backend: Backend,
    inv_step: A,
}

impl<A: NdFloat> FiniteDifference<A> {
    pub fn new(
        geometry: &ImageGeometry,
        axis: usize,
        method: Difference,
        backend: Backend,
    ) -> Result<Self> {
        if axis >= geometry.ndim() {
            return Err(Error::InvalidParameter {
                parameter: "axis".into(),
                message: format!("axis {} out of range for {} dimensions", axis, geometry.ndim()),
            });
        }
        let step = if geometry.has_channels() && axis == 0 {
            1.0
        } else {
            geometry.voxel_size()[axis]
        };
        Ok(FiniteDifference {
            geometry: geometry.clone(),
            axis,
            method,
            backend,
            inv_step: A::from(1.0 / step).unwrap(),
        })
    }

    pub fn axis(&self) -> usize {
        self.axis
    }
}

impl<A: NdFloat> LinearOperator<A> for FiniteDifference<A> {
    type Domain = ArrayD<A>;
    type Range = ArrayD<A>;

    fn direct_to(&self, x: &ArrayD<A>, out: &mut ArrayD<A>) -> Result<()> {
        self.geometry.check(x, "finite difference input")?;
        self.geometry.check(out, "finite difference output")?;
        let axis = Axis(self.axis);
        match (self.backend, self.method) {
            (Backend::Numpy, Difference::Forward) => sliced_forward(x, axis, self.inv_step, out),
            (Backend::Numpy, Difference::Backward) => sliced_backward(x, axis, self.inv_step, out),
            (Backend::C, Difference::Forward) => {
                fused(x, axis, out, |l, mut o| {
                    let n = l.len();
                    for i in 0..n {
                        o[i] = if i + 1 < n {
                            (l[i + 1] - l[i]) * self.inv_step
                        } else {
                            A::zero()
                        };
                    }
                })
            }
            (Backend::C, Difference::Backward) => fused(x, axis, out, |l, mut o| {
                for i in 0..l.len() {
                    o[i] = if i >= 1 {
                        (l[i] - l[i - 1]) * self.inv_step
                    } else {
                        A::zero()
                    };
                }
            }),
        }
        Ok(())
    }

    fn adjoint_to(&self, y: &ArrayD<A>, out: &mut ArrayD<A>) -> Result<()> {
        self.geometry.check(y, "finite difference adjoint input")?;
        self.geometry.check(out, "finite difference adjoint output")?;
        let axis = Axis(self.axis);
        match (self.backend, self.method) {
            (Backend::Numpy, Difference::Forward) => {
                sliced_forward_adjoint(y, axis, self.inv_step, out)
            }
            (Backend::Numpy, Difference::Backward) => {
                sliced_backward_adjoint(y, axis, self.inv_step, out)
            }
            (Backend::C, Difference::Forward) => fused(y, axis, out, |l, mut o| {
                let n = l.len();
                for i in 0..n {
                    let prev = if i >= 1 { l[i - 1] } else { A::zero() };
                    let cur = if i + 1 < n { l[i] } else { A::zero() };
                    o[i] = (prev - cur) * self.inv_step;
                }
            }),
            (Backend::C, Difference::Backward) => fused(y, axis, out, |l, mut o| {
                let n = l.len();
                for i in 0..n {
                    let cur = if i >= 1 { l[i] } else { A::zero() };
                    let next = if i + 1 < n { l[i + 1] } else { A::zero() };
                    o[i] = (cur - next) * self.inv_step;
                }
            }),
        }
        Ok(())
    }

    fn domain_allocate(&self) -> ArrayD<A> {
        self.geometry.allocate()
    }

    fn range_allocate(&self) -> ArrayD<A> {
        self.geometry.allocate()
    }
}

fn fused<A: NdFloat>(
    x: &ArrayD<A>,
    axis: Axis,
    out: &mut ArrayD<A>,
    kernel: impl Fn(ArrayView1<A>, ArrayViewMut1<A>),
) {
    Zip::from(out.lanes_mut(axis))
        .and(x.lanes(axis))
        .for_each(|o, l| kernel(l, o));
}

fn sliced_forward<A: NdFloat>(x: &ArrayD<A>, axis: Axis, inv: A, out: &mut ArrayD<A>) {
    let n = x.len_of(axis);
    out.fill(A::zero());
    if n < 2 {
        return;
    }
    Zip::from(out.slice_axis_mut(axis, Slice::from(0..n - 1)))
        .and(x.slice_axis(axis, Slice::from(1..n)))
        .and(x.slice_axis(axis, Slice::from(0..n - 1)))
        .for_each(|o, &next, &cur| *o = (next - cur) * inv);
}

fn sliced_backward<A: NdFloat>(x: &ArrayD<A>, axis: Axis, inv: A, out: &mut ArrayD<A>) {
    let n = x.len_of(axis);
    out.fill(A::zero());
    if n < 2 {
        return;
    }
    Zip::from(out.slice_axis_mut(axis, Slice::from(1..n)))
        .and(x.slice_axis(axis, Slice::from(1..n)))
        .and(x.slice_axis(axis, Slice::from(0..n - 1)))
        .for_each(|o, &cur, &prev| *o = (cur - prev) * inv);
}

fn sliced_forward_adjoint<A: NdFloat>(y: &ArrayD<A>, axis: Axis, inv: A, out: &mut ArrayD<A>) {
    let n = y.len_of(axis);
    out.fill(A::zero());
    if n < 2 {
        return;
    }
    let head = y.slice_axis(axis, Slice::from(0..n - 1));
    Zip::from(out.slice_axis_mut(axis, Slice::from(1..n)))
        .and(&head)
        .for_each(|o, &v| *o += v * inv);
    Zip::from(out.slice_axis_mut(axis, Slice::from(0..n - 1)))
        .and(&head)
        .for_each(|o, &v| *o -= v * inv);
}

fn sliced_backward_adjoint<A: NdFloat>(y: &ArrayD<A>, axis: Axis, inv: A, out: &mut ArrayD<A>) {
    let n = y.len_of(axis);
    out.fill(A::zero());
    if n < 2 {
        return;
    }
    let tail = y.slice_axis(axis, Slice::from(1..n));
    Zip::from(out.slice_axis_mut(axis, Slice::from(1..n)))
        .and(&tail)
        .for_each(|o, &v| *o += v * inv);
    Zip::from(out.slice_axis_mut(axis, Slice::from(0..n - 1)))
        .and(&tail)
        .for_each(|o, &v| *o -= v * inv);
}

fn differentiated_axes(geometry: &ImageGeometry, correlation: Correlation) -> Result<Vec<usize>> {
    let axes: Vec<usize> = match correlation {
        Correlation::Space => geometry.spatial_axes().collect(),
        Correlation::SpaceChannels => (0..geometry.ndim()).collect(),
    };
    if axes.is_empty() {
        return Err(Error::InvalidParameter {
            parameter: "domain".into(),
            message: format!("no axes to differentiate in shape {:?}", geometry.shape()),
        });
    }
    Ok(axes)
}

/// Forward difference gradient $`\nabla u = (D_0 u, \dots, D_{m-1} u)`$
#[derive(Clone, Debug)]
pub struct GradientOperator<A> {
    geometry: ImageGeometry,
    correlation: Correlation,
    components: Vec<FiniteDifference<A>>,
}

impl<A: NdFloat> GradientOperator<A> {
    pub fn new(
        geometry: &ImageGeometry,
        correlation: Correlation,
        backend: Backend,
    ) -> Result<Self> {
        let components = differentiated_axes(geometry, correlation)?
            .into_iter()
            .map(|axis| FiniteDifference::new(geometry, axis, Difference::Forward, backend))
            .collect::<Result<Vec<_>>>()?;
        Ok(GradientOperator {
            geometry: geometry.clone(),
            correlation,
            components,
        })
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn correlation(&self) -> Correlation {
        self.correlation
    }

    /// Number of gradient components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn axes(&self) -> Vec<usize> {
        self.components.iter().map(FiniteDifference::axis).collect()
    }
}

impl<A: NdFloat> LinearOperator<A> for GradientOperator<A> {
    type Domain = ArrayD<A>;
    type Range = BlockContainer<ArrayD<A>>;

    fn direct_to(&self, x: &ArrayD<A>, out: &mut BlockContainer<ArrayD<A>>) -> Result<()> {
        if out.len() != self.len() {
            return Err(Error::shape("gradient output blocks", &[self.len()], &[out.len()]));
        }
        for (d, o) in self.components.iter().zip(out.iter_mut()) {
            d.direct_to(x, o)?;
        }
        Ok(())
    }

    fn adjoint_to(&self, y: &BlockContainer<ArrayD<A>>, out: &mut ArrayD<A>) -> Result<()> {
        if y.len() != self.len() {
            return Err(Error::shape("gradient adjoint input blocks", &[self.len()], &[y.len()]));
        }
        self.geometry.check(out, "gradient adjoint output")?;
        out.fill(A::zero());
        let mut tmp = self.geometry.allocate();
        for (d, y_k) in self.components.iter().zip(y.iter()) {
            d.adjoint_to(y_k, &mut tmp)?;
            out.add_assign_from(&tmp);
        }
        Ok(())
    }

    fn domain_allocate(&self) -> ArrayD<A> {
        self.geometry.allocate()
    }

    fn range_allocate(&self) -> BlockContainer<ArrayD<A>> {
        BlockContainer::new(self.components.iter().map(|_| self.geometry.allocate()).collect())
    }
}

/// Symmetrised gradient of a vector field
///
/// For a field $`w = (w_0, \dots, w_{m-1})`$ returns the $`m \times m`$
/// matrix field, stored row major,
/// ```math
/// (\mathcal{E}w)_{ij} = \tfrac12 \left( D_j w_i + D_i w_j \right)
/// ```
/// using backward differences, the adjoint pairing of the forward
/// differences in [`GradientOperator`].
#[derive(Clone, Debug)]
pub struct SymmetrisedGradientOperator<A> {
    geometry: ImageGeometry,
    components: Vec<FiniteDifference<A>>,
}

impl<A: NdFloat> SymmetrisedGradientOperator<A> {
    pub fn new(
        geometry: &ImageGeometry,
        correlation: Correlation,
        backend: Backend,
    ) -> Result<Self> {
        let components = differentiated_axes(geometry, correlation)?
            .into_iter()
            .map(|axis| FiniteDifference::new(geometry, axis, Difference::Backward, backend))
            .collect::<Result<Vec<_>>>()?;
        Ok(SymmetrisedGradientOperator {
            geometry: geometry.clone(),
            components,
        })
    }

    /// Built on the range of a gradient, i.e. acting on its output fields.
    pub fn for_gradient(gradient: &GradientOperator<A>, backend: Backend) -> Result<Self> {
        Self::new(gradient.geometry(), gradient.correlation(), backend)
    }

    fn field_len(&self) -> usize {
        self.components.len()
    }
}

impl<A: NdFloat> LinearOperator<A> for SymmetrisedGradientOperator<A> {
    type Domain = BlockContainer<ArrayD<A>>;
    type Range = BlockContainer<ArrayD<A>>;

    fn direct_to(
        &self,
        w: &BlockContainer<ArrayD<A>>,
        out: &mut BlockContainer<ArrayD<A>>,
    ) -> Result<()> {
        let m = self.field_len();
        if w.len() != m {
            return Err(Error::shape("symmetrised gradient input blocks", &[m], &[w.len()]));
        }
        if out.len() != m * m {
            return Err(Error::shape("symmetrised gradient output blocks", &[m * m], &[out.len()]));
        }
        let half = A::from(0.5).unwrap();
        let mut tmp = self.geometry.allocate();
        for i in 0..m {
            self.components[i].direct_to(&w[i], &mut out[i * m + i])?;
            for j in (i + 1)..m {
                self.components[j].direct_to(&w[i], &mut tmp)?;
                let o = &mut out[i * m + j];
                self.components[i].direct_to(&w[j], o)?;
                o.add_assign_from(&tmp);
                o.scale_mut(half);
            }
            for j in 0..i {
                let (lower, upper) = (i * m + j, j * m + i);
                let symmetric = out[upper].clone();
                out[lower].assign(&symmetric);
            }
        }
        Ok(())
    }

    fn adjoint_to(
        &self,
        z: &BlockContainer<ArrayD<A>>,
        out: &mut BlockContainer<ArrayD<A>>,
    ) -> Result<()> {
        let m = self.field_len();
        if z.len() != m * m {
            return Err(Error::shape(
                "symmetrised gradient adjoint input blocks",
                &[m * m],
                &[z.len()],
            ));
        }
        if out.len() != m {
            return Err(Error::shape(
                "symmetrised gradient adjoint output blocks",
                &[m],
                &[out.len()],
            ));
        }
        let half = A::from(0.5).unwrap();
        let mut sym = self.geometry.allocate();
        let mut tmp = self.geometry.allocate();
        for k in 0..m {
            self.geometry.check(&out[k], "symmetrised gradient adjoint output")?;
            out[k].fill(A::zero());
            for j in 0..m {
                sym.assign(&z[k * m + j]);
                sym.add_assign_from(&z[j * m + k]);
                self.components[j].adjoint_to(&sym, &mut tmp)?;
                out[k].scaled_add(half, &tmp);
            }
        }
        Ok(())
    }

    fn domain_allocate(&self) -> BlockContainer<ArrayD<A>> {
        BlockContainer::new((0..self.field_len()).map(|_| self.geometry.allocate()).collect())
    }

    fn range_allocate(&self) -> BlockContainer<ArrayD<A>> {
        let m = self.field_len();
        BlockContainer::new((0..m * m).map(|_| self.geometry.allocate()).collect())
    }
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::linop::is_adjoint_pair;
    use approx::assert_abs_diff_eq;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand_xoshiro::rand_core::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn random(shape: &[usize], rng: &mut Xoshiro256StarStar) -> ArrayD<f64> {
        Array::random_using(IxDyn(shape), Uniform::new(-1., 1.), rng)
    }

    #[test]
    fn forward_difference_1d() {
        let g = ImageGeometry::new(&[4]);
        let x = array![1., 2., 4., 8.].into_dyn();
        for &backend in &[Backend::C, Backend::Numpy] {
            let D = FiniteDifference::new(&g, 0, Difference::Forward, backend).unwrap();
            assert_abs_diff_eq!(D.direct(&x).unwrap(), array![1., 2., 4., 0.].into_dyn());
            let B = FiniteDifference::new(&g, 0, Difference::Backward, backend).unwrap();
            assert_abs_diff_eq!(B.direct(&x).unwrap(), array![0., 1., 2., 4.].into_dyn());
        }
    }

    #[test]
    fn voxel_size_scales_differences() {
        let g = ImageGeometry::new(&[3]).with_voxel_size(&[0.5]).unwrap();
        let D = FiniteDifference::new(&g, 0, Difference::Forward, Backend::C).unwrap();
        let x = array![0., 1., 3.].into_dyn();
        assert_abs_diff_eq!(D.direct(&x).unwrap(), array![2., 4., 0.].into_dyn());
    }

    #[test]
    fn backends_agree() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        let g = ImageGeometry::new(&[5, 6, 3]);
        let x = random(g.shape(), &mut rng);
        for axis in 0..3 {
            for &method in &[Difference::Forward, Difference::Backward] {
                let c = FiniteDifference::new(&g, axis, method, Backend::C).unwrap();
                let np = FiniteDifference::new(&g, axis, method, Backend::Numpy).unwrap();
                assert_abs_diff_eq!(c.direct(&x).unwrap(), np.direct(&x).unwrap(), epsilon = 1e-14);
                assert_abs_diff_eq!(
                    c.adjoint(&x).unwrap(),
                    np.adjoint(&x).unwrap(),
                    epsilon = 1e-14
                );
            }
        }
    }

    #[test]
    fn difference_adjoints() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(11);
        let g = ImageGeometry::new(&[7, 4]).with_voxel_size(&[1.5, 0.25]).unwrap();
        let x = random(g.shape(), &mut rng);
        let y = random(g.shape(), &mut rng);
        for axis in 0..2 {
            for &method in &[Difference::Forward, Difference::Backward] {
                for &backend in &[Backend::C, Backend::Numpy] {
                    let D = FiniteDifference::new(&g, axis, method, backend).unwrap();
                    assert!(is_adjoint_pair(&D, &x, &y, 1e-12).unwrap());
                }
            }
        }
    }

    #[test]
    fn gradient_adjoint_and_norm() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let g = ImageGeometry::new(&[8, 9]);
        let G = GradientOperator::new(&g, Correlation::Space, Backend::C).unwrap();
        let x = random(g.shape(), &mut rng);
        let y = BlockContainer::new(vec![random(g.shape(), &mut rng), random(g.shape(), &mut rng)]);
        assert!(is_adjoint_pair(&G, &x, &y, 1e-12).unwrap());

        // ||grad||^2 <= 4 * ndim for unit spacing
        let n = G.norm().unwrap();
        assert!(n > 2.0 && n <= 8f64.sqrt() + 1e-6, "norm {}", n);
    }

    #[test]
    fn gradient_of_constant_vanishes() {
        let g = ImageGeometry::new(&[4, 4]);
        let G = GradientOperator::new(&g, Correlation::Space, Backend::Numpy).unwrap();
        let x = ArrayD::from_elem(IxDyn(&[4, 4]), 3.0);
        let dx = G.direct(&x).unwrap();
        assert_abs_diff_eq!(dx.squared_norm(), 0.0);
    }

    #[test]
    fn correlation_selects_axes() {
        let g = ImageGeometry::new(&[3, 8, 8]).with_channels(true);
        let space = GradientOperator::<f64>::new(&g, Correlation::Space, Backend::C).unwrap();
        assert_eq!(space.axes(), vec![1, 2]);
        let full =
            GradientOperator::<f64>::new(&g, Correlation::SpaceChannels, Backend::C).unwrap();
        assert_eq!(full.axes(), vec![0, 1, 2]);

        let flat = ImageGeometry::new(&[3]).with_channels(true);
        assert!(GradientOperator::<f64>::new(&flat, Correlation::Space, Backend::C).is_err());
    }

    #[test]
    fn symmetrised_gradient_adjoint() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(5);
        let g = ImageGeometry::new(&[6, 5]);
        for &backend in &[Backend::C, Backend::Numpy] {
            let E = SymmetrisedGradientOperator::new(&g, Correlation::Space, backend).unwrap();
            let w = BlockContainer::new((0..2).map(|_| random(g.shape(), &mut rng)).collect());
            let z = BlockContainer::new((0..4).map(|_| random(g.shape(), &mut rng)).collect());
            assert!(is_adjoint_pair(&E, &w, &z, 1e-12).unwrap());

            let Ew = E.direct(&w).unwrap();
            assert_abs_diff_eq!(Ew[1], Ew[2], epsilon = 1e-15);
        }
    }

    #[test]
    fn parse_options() {
        assert_eq!("Space".parse::<Correlation>().unwrap(), Correlation::Space);
        assert_eq!("SpaceChannels".parse::<Correlation>().unwrap(), Correlation::SpaceChannels);
        assert_eq!("numpy".parse::<Backend>().unwrap(), Backend::Numpy);
        assert!("cuda".parse::<Backend>().is_err());
        assert_eq!(Backend::default().to_string(), "c");
    }
}
