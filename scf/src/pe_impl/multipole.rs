//! Cartesian multipoles, environment sites and interaction tensors.
//!
//! Components of a rank-`k` tensor are stored in the canonical order produced by
//! [`components`]: for rank 2 that is XX, XY, XZ, YY, YZ, ZZ.

use crate::error::{Result, ScfError};
use nalgebra::{Matrix3, Vector3};

/// Highest multipole rank with electronic integrals.
pub const MAX_ORDER: usize = 2;

pub fn n_components(k: usize) -> usize {
    (k + 1) * (k + 2) / 2
}

/// Cartesian exponents `[x, y, z]` of the rank-`k` components, in storage order.
pub fn components(k: usize) -> Vec<[usize; 3]> {
    let mut res = Vec::with_capacity(n_components(k));
    for x in (0..=k).rev() {
        for y in (0..=(k - x)).rev() {
            res.push([x, y, k - x - y]);
        }
    }
    res
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, x| acc * x as f64)
}

fn double_factorial(n: i64) -> f64 {
    let mut acc = 1.0;
    let mut i = n;
    while i > 1 {
        acc *= i as f64;
        i -= 2;
    }
    acc
}

/// Number of index permutations a component of a symmetric tensor stands for.
pub fn symmetry_factor(c: [usize; 3]) -> f64 {
    factorial(c[0] + c[1] + c[2]) / (factorial(c[0]) * factorial(c[1]) * factorial(c[2]))
}

/// Weights of the electronic multipole integrals, `-1 / k!` times the symmetry factor.
///
/// The integrals are derivatives with respect to the site, so every order carries the
/// same sign; the minus is the electron charge. Order 0 gives `[-1]`, order 1
/// `[-1, -1, -1]`, order 2 `[-1/2, -1, -1, -1/2, -1, -1/2]`.
pub fn prefactors(k: usize) -> Result<Vec<f64>> {
    if k > MAX_ORDER {
        return Err(ScfError::UnsupportedOrder { order: k });
    }
    let taylor = -1.0 / factorial(k);
    Ok(components(k)
        .into_iter()
        .map(|c| taylor * symmetry_factor(c))
        .collect())
}

/// Weights `(-1)^k / k!` times the symmetry factor for interaction tensors taken
/// with respect to the field point. No order cap; the classical side works at any rank.
pub(crate) fn taylor_weights(k: usize) -> Vec<f64> {
    let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
    let taylor = sign / factorial(k);
    components(k)
        .into_iter()
        .map(|c| taylor * symmetry_factor(c))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Multipole {
    pub k: usize,
    pub values: Vec<f64>,
}

impl Multipole {
    /// Rank-2 moments are made traceless here.
    pub fn new(k: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_components(k) {
            return Err(ScfError::InvalidConfiguration(format!(
                "multipole of order {} needs {} components, got {}",
                k,
                n_components(k),
                values.len()
            )));
        }
        let mut m = Multipole { k, values };
        m.remove_trace();
        Ok(m)
    }

    pub fn remove_trace(&mut self) {
        if self.k != 2 {
            return;
        }
        let trace = (self.values[0] + self.values[3] + self.values[5]) / 3.0;
        self.values[0] -= trace;
        self.values[3] -= trace;
        self.values[5] -= trace;
    }
}

/// An environment site.
#[derive(Debug, Clone)]
pub struct Potential {
    /// Position of the site in the input; stable for the lifetime of the calculation.
    pub index: usize,
    pub label: Option<String>,
    pub position: Vector3<f64>,
    pub multipoles: Vec<Multipole>,
    pub polarizability: Option<Matrix3<f64>>,
    pub exclusions: Vec<usize>,
}

impl Potential {
    pub fn is_polarizable(&self) -> bool {
        self.polarizability.is_some()
    }

    pub fn max_order(&self) -> Option<usize> {
        self.multipoles.iter().map(|m| m.k).max()
    }

    pub fn excludes(&self, other: &Potential) -> bool {
        self.index == other.index
            || self.exclusions.contains(&other.index)
            || other.exclusions.contains(&self.index)
    }
}

/// Symmetric 3x3 tensor from XX, XY, XZ, YY, YZ, ZZ.
pub fn symmetric_from_components(c: &[f64; 6]) -> Matrix3<f64> {
    Matrix3::new(c[0], c[1], c[2], c[1], c[3], c[4], c[2], c[4], c[5])
}

fn tensor_recursion(t: usize, u: usize, v: usize, n: usize, r: &Vector3<f64>, rn: f64) -> f64 {
    if t == 0 && u == 0 && v == 0 {
        let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
        return sign * double_factorial(2 * n as i64 - 1) / rn.powi(2 * n as i32 + 1);
    }
    let mut val = 0.0;
    if t > 0 {
        if t > 1 {
            val += (t - 1) as f64 * tensor_recursion(t - 2, u, v, n + 1, r, rn);
        }
        val += r.x * tensor_recursion(t - 1, u, v, n + 1, r, rn);
    } else if u > 0 {
        if u > 1 {
            val += (u - 1) as f64 * tensor_recursion(t, u - 2, v, n + 1, r, rn);
        }
        val += r.y * tensor_recursion(t, u - 1, v, n + 1, r, rn);
    } else {
        if v > 1 {
            val += (v - 1) as f64 * tensor_recursion(t, u, v - 2, n + 1, r, rn);
        }
        val += r.z * tensor_recursion(t, u, v - 1, n + 1, r, rn);
    }
    val
}

/// `∂x^t ∂y^u ∂z^v (1/|r|)`
pub fn interaction_tensor(r: &Vector3<f64>, t: usize, u: usize, v: usize) -> f64 {
    tensor_recursion(t, u, v, 0, r, r.norm())
}

/// All rank-`k` interaction tensor components at `r`.
pub fn interaction_tensors(r: &Vector3<f64>, k: usize) -> Vec<f64> {
    components(k)
        .into_iter()
        .map(|[t, u, v]| interaction_tensor(r, t, u, v))
        .collect()
}

/// Dipole-dipole tensor `∇∇(1/|r|)` as a matrix.
pub fn t2_matrix(r: &Vector3<f64>) -> Matrix3<f64> {
    let t = interaction_tensors(r, 2);
    symmetric_from_components(&[t[0], t[1], t[2], t[3], t[4], t[5]])
}

/// Derivatives of rank `l` of the electrostatic potential of `site` at `point`,
/// one value per component of order `l`.
///
/// `φ(R) = Σ_k (-1)^k/k! Σ_c sym_c M_c T_c(R - R_site)`, so `l = 0` is the potential
/// and `-(l = 1)` the field.
pub fn potential_derivatives(site: &Potential, point: &Vector3<f64>, l: usize) -> Vec<f64> {
    let r = point - site.position;
    components(l)
        .into_iter()
        .map(|d| {
            site.multipoles
                .iter()
                .map(|m| {
                    components(m.k)
                        .into_iter()
                        .zip(taylor_weights(m.k))
                        .zip(&m.values)
                        .map(|((c, w), value)| {
                            w * value * interaction_tensor(&r, c[0] + d[0], c[1] + d[1], c[2] + d[2])
                        })
                        .sum::<f64>()
                })
                .sum::<f64>()
        })
        .collect()
}

/// Electric field of `site` at `point`.
pub fn site_field(site: &Potential, point: &Vector3<f64>) -> Vector3<f64> {
    let d = potential_derivatives(site, point, 1);
    -Vector3::new(d[0], d[1], d[2])
}
