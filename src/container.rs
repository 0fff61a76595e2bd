//! Vector spaces the functions and operators act on
//!
//! The [`Container`] trait is the small set of vector operations every
//! function, operator and solver in this crate needs: allocation, in-place
//! axpy style updates, inner products and reductions. It is implemented
//! for any `ndarray::Array`, for [`BlockContainer`] (an ordered list of
//! same-kind containers) and for pairs `(X, Y)`, which model the
//! heterogeneous 2-block vectors of a block operator.

use std::ops::{Index, IndexMut};

use approx::AbsDiffEq;
use ndarray::prelude::*;
use ndarray::{Dimension, IxDyn, NdFloat, Zip};
use num_traits::{Float, One, Zero};

use crate::error::{Error, Result};

/// Vector operations required from a numeric container.
pub trait Container: Clone {
    type Elem: NdFloat;

    /// A container of the same shape filled with zeros.
    fn zeros_like(&self) -> Self;

    /// Overwrite `self` with `other`.
    fn assign(&mut self, other: &Self);

    /// `self *= alpha`
    fn scale_mut(&mut self, alpha: Self::Elem);

    /// `self += alpha * other`
    fn scaled_add(&mut self, alpha: Self::Elem, other: &Self);

    /// Euclidean inner product.
    fn dot(&self, other: &Self) -> Self::Elem;

    /// Sum of all entries.
    fn sum(&self) -> Self::Elem;

    /// Elementwise `max(self, floor)`.
    fn maximum(&self, floor: Self::Elem) -> Self;

    /// Visit every entry in storage order.
    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Self::Elem));

    fn same_shape(&self, other: &Self) -> bool;

    /// Shape summary used in error messages.
    fn dims(&self) -> Vec<usize>;

    /// Overwrite every entry with zero.
    fn set_zero(&mut self) {
        self.for_each_mut(&mut |v| *v = Self::Elem::zero());
    }

    /// `self += other`
    fn add_assign_from(&mut self, other: &Self) {
        self.scaled_add(Self::Elem::one(), other);
    }

    /// `self -= other`
    fn sub_assign_from(&mut self, other: &Self) {
        self.scaled_add(-Self::Elem::one(), other);
    }

    fn scaled(&self, alpha: Self::Elem) -> Self {
        let mut out = self.clone();
        out.scale_mut(alpha);
        out
    }

    /// `self + other` into a new container
    fn added(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.add_assign_from(other);
        out
    }

    /// `self - other` into a new container
    fn subtracted(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.sub_assign_from(other);
        out
    }

    fn squared_norm(&self) -> Self::Elem {
        self.dot(self)
    }

    fn norm(&self) -> Self::Elem {
        Float::sqrt(self.squared_norm())
    }

    /// Fails with [`Error::ShapeMismatch`] unless `other` has the shape of `self`.
    fn check_shape(&self, other: &Self, context: &'static str) -> Result<()> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(Error::shape(context, &self.dims(), &other.dims()))
        }
    }
}

impl<A, D> Container for Array<A, D>
where
    A: NdFloat,
    D: Dimension,
{
    type Elem = A;

    fn zeros_like(&self) -> Self {
        Array::zeros(self.raw_dim())
    }

    fn assign(&mut self, other: &Self) {
        ArrayBase::assign(self, other);
    }

    fn scale_mut(&mut self, alpha: A) {
        self.mapv_inplace(|v| v * alpha);
    }

    fn scaled_add(&mut self, alpha: A, other: &Self) {
        ArrayBase::scaled_add(self, alpha, other);
    }

    fn dot(&self, other: &Self) -> A {
        Zip::from(self)
            .and(other)
            .fold(A::zero(), |acc, &a, &b| acc + a * b)
    }

    fn sum(&self) -> A {
        ArrayBase::sum(self)
    }

    fn maximum(&self, floor: A) -> Self {
        self.mapv(|v| Float::max(v, floor))
    }

    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut A)) {
        self.iter_mut().for_each(|v| f(v));
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    fn dims(&self) -> Vec<usize> {
        self.shape().to_vec()
    }
}

/// An ordered list of containers of the same kind, e.g. the components
/// of a gradient field.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockContainer<C> {
    blocks: Vec<C>,
}

impl<C> BlockContainer<C> {
    pub fn new(blocks: Vec<C>) -> Self {
        BlockContainer { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.blocks.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, C> {
        self.blocks.iter_mut()
    }

    pub fn into_blocks(self) -> Vec<C> {
        self.blocks
    }
}

impl<C> Index<usize> for BlockContainer<C> {
    type Output = C;

    fn index(&self, index: usize) -> &C {
        &self.blocks[index]
    }
}

impl<C> IndexMut<usize> for BlockContainer<C> {
    fn index_mut(&mut self, index: usize) -> &mut C {
        &mut self.blocks[index]
    }
}

impl<C: Container> Container for BlockContainer<C> {
    type Elem = C::Elem;

    fn zeros_like(&self) -> Self {
        BlockContainer::new(self.blocks.iter().map(Container::zeros_like).collect())
    }

    fn assign(&mut self, other: &Self) {
        for (b, o) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            b.assign(o);
        }
    }

    fn scale_mut(&mut self, alpha: C::Elem) {
        self.blocks.iter_mut().for_each(|b| b.scale_mut(alpha));
    }

    fn scaled_add(&mut self, alpha: C::Elem, other: &Self) {
        for (b, o) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            b.scaled_add(alpha, o);
        }
    }

    fn dot(&self, other: &Self) -> C::Elem {
        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .fold(C::Elem::zero(), |acc, (b, o)| acc + b.dot(o))
    }

    fn sum(&self) -> C::Elem {
        self.blocks
            .iter()
            .fold(C::Elem::zero(), |acc, b| acc + b.sum())
    }

    fn maximum(&self, floor: C::Elem) -> Self {
        BlockContainer::new(self.blocks.iter().map(|b| b.maximum(floor)).collect())
    }

    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut C::Elem)) {
        for b in self.blocks.iter_mut() {
            b.for_each_mut(f);
        }
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .blocks
                .iter()
                .zip(other.blocks.iter())
                .all(|(b, o)| b.same_shape(o))
    }

    fn dims(&self) -> Vec<usize> {
        let mut dims = vec![self.len()];
        if let Some(first) = self.blocks.first() {
            dims.extend(first.dims());
        }
        dims
    }
}

impl<C> AbsDiffEq for BlockContainer<C>
where
    C: AbsDiffEq,
    C::Epsilon: Clone,
{
    type Epsilon = C::Epsilon;

    fn default_epsilon() -> Self::Epsilon {
        C::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.len() == other.len()
            && self
                .blocks
                .iter()
                .zip(other.blocks.iter())
                .all(|(b, o)| b.abs_diff_eq(o, epsilon.clone()))
    }
}

impl<X, Y> Container for (X, Y)
where
    X: Container,
    Y: Container<Elem = X::Elem>,
{
    type Elem = X::Elem;

    fn zeros_like(&self) -> Self {
        (self.0.zeros_like(), self.1.zeros_like())
    }

    fn assign(&mut self, other: &Self) {
        self.0.assign(&other.0);
        self.1.assign(&other.1);
    }

    fn scale_mut(&mut self, alpha: X::Elem) {
        self.0.scale_mut(alpha);
        self.1.scale_mut(alpha);
    }

    fn scaled_add(&mut self, alpha: X::Elem, other: &Self) {
        self.0.scaled_add(alpha, &other.0);
        self.1.scaled_add(alpha, &other.1);
    }

    fn dot(&self, other: &Self) -> X::Elem {
        self.0.dot(&other.0) + self.1.dot(&other.1)
    }

    fn sum(&self) -> X::Elem {
        self.0.sum() + self.1.sum()
    }

    fn maximum(&self, floor: X::Elem) -> Self {
        (self.0.maximum(floor), self.1.maximum(floor))
    }

    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut X::Elem)) {
        self.0.for_each_mut(f);
        self.1.for_each_mut(f);
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.0.same_shape(&other.0) && self.1.same_shape(&other.1)
    }

    fn dims(&self) -> Vec<usize> {
        let mut dims = self.0.dims();
        dims.extend(self.1.dims());
        dims
    }
}

/// Shape and sampling of an image, optionally with a leading channel axis.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageGeometry {
    shape: Vec<usize>,
    voxel_size: Vec<f64>,
    channels: bool,
}

impl ImageGeometry {
    /// Unit voxel size, no channel axis.
    pub fn new(shape: &[usize]) -> Self {
        ImageGeometry {
            shape: shape.to_vec(),
            voxel_size: vec![1.0; shape.len()],
            channels: false,
        }
    }

    pub fn from_array<A, D: Dimension>(x: &Array<A, D>) -> Self {
        ImageGeometry::new(x.shape())
    }

    /// Set the sampling distance along every axis.
    pub fn with_voxel_size(mut self, voxel_size: &[f64]) -> Result<Self> {
        if voxel_size.len() != self.shape.len() {
            return Err(Error::InvalidParameter {
                parameter: "voxel_size".into(),
                message: format!(
                    "expected {} entries, got {}",
                    self.shape.len(),
                    voxel_size.len()
                ),
            });
        }
        if voxel_size.iter().any(|&h| !(h > 0.0) || !h.is_finite()) {
            return Err(Error::InvalidParameter {
                parameter: "voxel_size".into(),
                message: "entries must be positive and finite".into(),
            });
        }
        self.voxel_size = voxel_size.to_vec();
        Ok(self)
    }

    /// Treat axis 0 as a channel axis.
    pub fn with_channels(mut self, channels: bool) -> Self {
        self.channels = channels && !self.shape.is_empty();
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn voxel_size(&self) -> &[f64] {
        &self.voxel_size
    }

    pub fn has_channels(&self) -> bool {
        self.channels
    }

    /// Axes that carry spatial (non-channel) samples.
    pub fn spatial_axes(&self) -> std::ops::Range<usize> {
        if self.channels {
            1..self.ndim()
        } else {
            0..self.ndim()
        }
    }

    pub fn allocate<A: NdFloat>(&self) -> ArrayD<A> {
        Array::zeros(IxDyn(&self.shape))
    }

    pub fn check<A, D: Dimension>(&self, x: &Array<A, D>, context: &'static str) -> Result<()> {
        if x.shape() == self.shape.as_slice() {
            Ok(())
        } else {
            Err(Error::shape(context, &self.shape, x.shape()))
        }
    }
}
