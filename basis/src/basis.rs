#![allow(non_snake_case)]
use nalgebra::{Matrix3, Vector3};
use std::sync::Arc;

/// A single (possibly contracted) real basis function and the integrals it supports.
///
/// Derivative integrals follow the usual AO convention: `∇` acts on the electron
/// coordinate of the basis function, not on its center.
pub trait Basis {
    fn evaluate(&self, r: &Vector3<f64>) -> f64;

    /// Overlap `<a|b>`.
    fn Sab(a: &Self, b: &Self) -> f64;
    /// Kinetic energy `<a|-1/2 ∇²|b>`.
    fn Tab(a: &Self, b: &Self) -> f64;
    /// Attraction to a nucleus of charge `Z` at `R`, `-Z <a|1/|r-R||b>`.
    fn Vab(a: &Self, b: &Self, R: Vector3<f64>, Z: u32) -> f64;
    /// Two-electron repulsion `(ab|cd)` in chemists' notation.
    fn JKabcd(a: &Self, b: &Self, c: &Self, d: &Self) -> f64;

    /// `<a| 1/|r-C| |b>`
    fn Rinvab(a: &Self, b: &Self, C: Vector3<f64>) -> f64;
    /// `<∇a| 1/|r-C| |b>`
    fn dRinvab(a: &Self, b: &Self, C: Vector3<f64>) -> Vector3<f64>;
    /// `<∇∇a| 1/|r-C| |b>`, element `(μ, ν)` is `<∂μ∂ν a|..|b>`
    fn ddRinvab(a: &Self, b: &Self, C: Vector3<f64>) -> Matrix3<f64>;
    /// `<∇a| 1/|r-C| |∇b>`, element `(μ, ν)` is `<∂μ a|..|∂ν b>`
    fn dRinvdab(a: &Self, b: &Self, C: Vector3<f64>) -> Matrix3<f64>;
}

/// The block of basis functions sitting on one atom.
pub trait AOBasis {
    type BasisType: Basis;

    fn basis_size(&self) -> usize;
    fn get_basis(&self) -> Vec<Arc<Self::BasisType>>;
    fn set_center(&mut self, center: Vector3<f64>);
    fn get_center(&self) -> Option<Vector3<f64>>;
}
