#![allow(non_snake_case)]
extern crate nalgebra as na;

use crate::basis::Basis;
use crate::helper::boys_function;
use itertools::iproduct;
use na::{Matrix3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO1d {
    pub alpha: f64,
    pub l: i32,
    pub center: f64,
    pub norm: f64,
}

fn factorial(n: i32) -> f64 {
    (1..=n).fold(1.0, |acc, x| acc * x as f64)
}

impl GTO1d {
    pub fn new(alpha: f64, l: i32, center: f64) -> Self {
        let norm = GTO1d::compute_norm(alpha, l);
        Self {
            alpha,
            l,
            center,
            norm,
        }
    }

    // N^2 = 2^(3l) l! alpha^l sqrt(2 alpha / pi) / (2l)!
    fn compute_norm(alpha: f64, l: i32) -> f64 {
        let numerator = 2.0_f64.powi(3 * l) * factorial(l) * alpha.powi(l);
        let factor = (2.0 * alpha / PI).sqrt();
        (numerator * factor / factorial(2 * l)).sqrt()
    }

    pub(crate) fn evaluate(&self, x: f64) -> f64 {
        let x = x - self.center;
        self.norm * x.powi(self.l) * (-self.alpha * x.powi(2)).exp()
    }

    /// Hermite expansion coefficients E_t^{ij} of the overlap distribution
    /// (McMurchie–Davidson), `Qx = A_x - B_x`.
    pub fn Eab(i: i32, j: i32, t: i32, Qx: f64, a: f64, b: f64) -> f64 {
        let p = a + b;
        let q = a * b / p;

        if t < 0 || t > i + j || i < 0 || j < 0 {
            0.0
        } else if i == 0 && j == 0 && t == 0 {
            (-q * Qx.powi(2)).exp()
        } else if j == 0 {
            GTO1d::Eab(i - 1, j, t - 1, Qx, a, b) / (2.0 * p)
                - GTO1d::Eab(i - 1, j, t, Qx, a, b) * q * Qx / a
                + GTO1d::Eab(i - 1, j, t + 1, Qx, a, b) * ((t + 1) as f64)
        } else {
            GTO1d::Eab(i, j - 1, t - 1, Qx, a, b) / (2.0 * p)
                + GTO1d::Eab(i, j - 1, t, Qx, a, b) * q * Qx / b
                + GTO1d::Eab(i, j - 1, t + 1, Qx, a, b) * ((t + 1) as f64)
        }
    }

    pub(crate) fn Sab(a: &GTO1d, b: &GTO1d) -> f64 {
        let p = a.alpha + b.alpha;
        let Qx = a.center - b.center;
        GTO1d::Eab(a.l, b.l, 0, Qx, a.alpha, b.alpha) * (PI / p).sqrt() * a.norm * b.norm
    }

    pub(crate) fn Tab(a: &GTO1d, b: &GTO1d) -> f64 {
        let p = a.alpha + b.alpha;
        let Qx = a.center - b.center;
        let norm = a.norm * b.norm * (PI / p).sqrt();

        let term1 =
            b.l as f64 * (b.l as f64 - 1.0) * GTO1d::Eab(a.l, b.l - 2, 0, Qx, a.alpha, b.alpha);
        let term2 = -2.0
            * b.alpha
            * (2.0 * b.l as f64 + 1.0)
            * GTO1d::Eab(a.l, b.l, 0, Qx, a.alpha, b.alpha);
        let term3 = 4.0 * b.alpha.powi(2) * GTO1d::Eab(a.l, b.l + 2, 0, Qx, a.alpha, b.alpha);

        -0.5 * norm * (term1 + term2 + term3)
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct GTO {
    pub alpha: f64,
    pub l_xyz: Vector3<i32>,
    pub center: Vector3<f64>,
    pub norm: f64,
    pub gto1d: [GTO1d; 3],
}

impl GTO {
    pub fn new(alpha: f64, l_xyz: Vector3<i32>, center: Vector3<f64>) -> Self {
        let gto1d = [
            GTO1d::new(alpha, l_xyz.x, center.x),
            GTO1d::new(alpha, l_xyz.y, center.y),
            GTO1d::new(alpha, l_xyz.z, center.z),
        ];
        let norm = gto1d[0].norm * gto1d[1].norm * gto1d[2].norm;
        Self {
            alpha,
            l_xyz,
            center,
            norm,
            gto1d,
        }
    }

    /// Same exponent and angular momentum, moved to `center`.
    pub fn recentered(&self, center: Vector3<f64>) -> Self {
        GTO::new(self.alpha, self.l_xyz, center)
    }

    pub(crate) fn merge(a: &GTO, b: &GTO) -> GTO {
        let center = (a.center * a.alpha + b.center * b.alpha) / (a.alpha + b.alpha);
        let l_xyz = a.l_xyz + b.l_xyz;
        let alpha = a.alpha + b.alpha;
        GTO::new(alpha, l_xyz, center)
    }

    /// Coulomb auxiliary Hermite integrals R^n_{tuv} (Helgaker, Jørgensen & Olsen, ch. 9.9).
    ///
    /// * `t, u, v` - Hermite orders in x, y, z
    /// * `n` - Boys function order
    /// * `p` - exponent of the Gaussian charge distribution
    /// * `PCx, PCy, PCz, RPC` - components and length of P - C
    pub fn hermite_coulomb(
        t: i32, u: i32, v: i32,
        n: i32, p: f64,
        PCx: f64, PCy: f64, PCz: f64, RPC: f64,
    ) -> f64 {
        let T = p * RPC * RPC;
        let mut val = 0.0;

        if t == 0 && u == 0 && v == 0 {
            val += (-2.0 * p).powi(n) * boys_function(n, T);
        } else if t == 0 && u == 0 {
            if v > 1 {
                val += (v as f64 - 1.0)
                    * GTO::hermite_coulomb(t, u, v - 2, n + 1, p, PCx, PCy, PCz, RPC);
            }
            val += PCz * GTO::hermite_coulomb(t, u, v - 1, n + 1, p, PCx, PCy, PCz, RPC);
        } else if t == 0 {
            if u > 1 {
                val += (u as f64 - 1.0)
                    * GTO::hermite_coulomb(t, u - 2, v, n + 1, p, PCx, PCy, PCz, RPC);
            }
            val += PCy * GTO::hermite_coulomb(t, u - 1, v, n + 1, p, PCx, PCy, PCz, RPC);
        } else {
            if t > 1 {
                val += (t as f64 - 1.0)
                    * GTO::hermite_coulomb(t - 2, u, v, n + 1, p, PCx, PCy, PCz, RPC);
            }
            val += PCx * GTO::hermite_coulomb(t - 1, u, v, n + 1, p, PCx, PCy, PCz, RPC);
        }

        val
    }

    /// Product E_t E_u E_v of the three Cartesian Hermite coefficients.
    fn hermite_product(
        alpha_a: f64, la: &Vector3<i32>, A: &Vector3<f64>,
        alpha_b: f64, lb: &Vector3<i32>, B: &Vector3<f64>,
        t: i32, u: i32, v: i32,
    ) -> f64 {
        GTO1d::Eab(la.x, lb.x, t, A.x - B.x, alpha_a, alpha_b)
            * GTO1d::Eab(la.y, lb.y, u, A.y - B.y, alpha_a, alpha_b)
            * GTO1d::Eab(la.z, lb.z, v, A.z - B.z, alpha_a, alpha_b)
    }

    /// Unnormalized `<a| 1/|r-C| |b>` for Cartesian Gaussians of arbitrary angular
    /// momentum. A negative component stands for a vanishing function.
    fn coulomb_primitive(
        alpha_a: f64, la: &Vector3<i32>, A: &Vector3<f64>,
        alpha_b: f64, lb: &Vector3<i32>, B: &Vector3<f64>,
        C: &Vector3<f64>,
    ) -> f64 {
        if la.iter().chain(lb.iter()).any(|&l| l < 0) {
            return 0.0;
        }
        let p = alpha_a + alpha_b;
        let P = (A * alpha_a + B * alpha_b) / p;
        let pc = P - C;
        let rpc = pc.norm();

        let val = iproduct!(0..=la.x + lb.x, 0..=la.y + lb.y, 0..=la.z + lb.z)
            .map(|(t, u, v)| {
                GTO::hermite_product(alpha_a, la, A, alpha_b, lb, B, t, u, v)
                    * GTO::hermite_coulomb(t, u, v, 0, p, pc.x, pc.y, pc.z, rpc)
            })
            .sum::<f64>();

        2.0 * PI / p * val
    }

    /// `∂/∂r_dir` of an unnormalized Cartesian Gaussian written as a combination of
    /// Gaussians with shifted angular momentum: `l x^(l-1) - 2 alpha x^(l+1)`.
    fn derivative_terms(alpha: f64, l: &Vector3<i32>, dir: usize) -> [(f64, Vector3<i32>); 2] {
        let mut lower = *l;
        lower[dir] -= 1;
        let mut upper = *l;
        upper[dir] += 1;
        [(l[dir] as f64, lower), (-2.0 * alpha, upper)]
    }

    fn coulomb_d(a: &GTO, b: &GTO, C: &Vector3<f64>, mu: usize) -> f64 {
        GTO::derivative_terms(a.alpha, &a.l_xyz, mu)
            .iter()
            .filter(|(c, _)| *c != 0.0)
            .map(|(c, la)| {
                c * GTO::coulomb_primitive(a.alpha, la, &a.center, b.alpha, &b.l_xyz, &b.center, C)
            })
            .sum()
    }

    fn coulomb_dd(a: &GTO, b: &GTO, C: &Vector3<f64>, mu: usize, nu: usize) -> f64 {
        let mut val = 0.0;
        for (c1, l1) in GTO::derivative_terms(a.alpha, &a.l_xyz, mu) {
            if c1 == 0.0 {
                continue;
            }
            for (c2, l2) in GTO::derivative_terms(a.alpha, &l1, nu) {
                if c2 == 0.0 {
                    continue;
                }
                val += c1
                    * c2
                    * GTO::coulomb_primitive(a.alpha, &l2, &a.center, b.alpha, &b.l_xyz, &b.center, C);
            }
        }
        val
    }

    fn coulomb_d_d(a: &GTO, b: &GTO, C: &Vector3<f64>, mu: usize, nu: usize) -> f64 {
        let mut val = 0.0;
        for (ca, la) in GTO::derivative_terms(a.alpha, &a.l_xyz, mu) {
            if ca == 0.0 {
                continue;
            }
            for (cb, lb) in GTO::derivative_terms(b.alpha, &b.l_xyz, nu) {
                if cb == 0.0 {
                    continue;
                }
                val += ca
                    * cb
                    * GTO::coulomb_primitive(a.alpha, &la, &a.center, b.alpha, &lb, &b.center, C);
            }
        }
        val
    }
}

impl Basis for GTO {
    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.gto1d[0].evaluate(r.x) * self.gto1d[1].evaluate(r.y) * self.gto1d[2].evaluate(r.z)
    }

    fn Sab(a: &GTO, b: &GTO) -> f64 {
        GTO1d::Sab(&a.gto1d[0], &b.gto1d[0])
            * GTO1d::Sab(&a.gto1d[1], &b.gto1d[1])
            * GTO1d::Sab(&a.gto1d[2], &b.gto1d[2])
    }

    fn Tab(a: &GTO, b: &GTO) -> f64 {
        GTO1d::Tab(&a.gto1d[0], &b.gto1d[0])
            * GTO1d::Sab(&a.gto1d[1], &b.gto1d[1])
            * GTO1d::Sab(&a.gto1d[2], &b.gto1d[2])
            + GTO1d::Tab(&a.gto1d[1], &b.gto1d[1])
                * GTO1d::Sab(&a.gto1d[0], &b.gto1d[0])
                * GTO1d::Sab(&a.gto1d[2], &b.gto1d[2])
            + GTO1d::Tab(&a.gto1d[2], &b.gto1d[2])
                * GTO1d::Sab(&a.gto1d[0], &b.gto1d[0])
                * GTO1d::Sab(&a.gto1d[1], &b.gto1d[1])
    }

    fn Vab(a: &GTO, b: &GTO, R: Vector3<f64>, Z: u32) -> f64 {
        // nuclear attraction carries the minus sign
        -(Z as f64) * GTO::Rinvab(a, b, R)
    }

    fn JKabcd(a: &GTO, b: &GTO, c: &GTO, d: &GTO) -> f64 {
        let e = GTO::merge(a, b);
        let f = GTO::merge(c, d);
        let dr = e.center - f.center;
        let alpha = e.alpha * f.alpha / (e.alpha + f.alpha);

        let val = iproduct!(
            0..=e.l_xyz.x,
            0..=e.l_xyz.y,
            0..=e.l_xyz.z,
            0..=f.l_xyz.x,
            0..=f.l_xyz.y,
            0..=f.l_xyz.z
        )
        .par_bridge()
        .map(|(i, j, k, l, m, n)| {
            let eab = GTO::hermite_product(
                a.alpha, &a.l_xyz, &a.center, b.alpha, &b.l_xyz, &b.center, i, j, k,
            );
            let ecd = GTO::hermite_product(
                c.alpha, &c.l_xyz, &c.center, d.alpha, &d.l_xyz, &d.center, l, m, n,
            );
            let hermite_val =
                GTO::hermite_coulomb(i + l, j + m, k + n, 0, alpha, dr.x, dr.y, dr.z, dr.norm());

            // (-1)^(l+m+n) from the ket-side Hermite derivatives
            let sgn = if (l + m + n) % 2 == 0 { 1.0 } else { -1.0 };
            eab * ecd * sgn * hermite_val
        })
        .sum::<f64>();

        a.norm * b.norm * c.norm * d.norm * val * 2.0 * PI.powf(2.5)
            / (e.alpha * f.alpha * (e.alpha + f.alpha).sqrt())
    }

    fn Rinvab(a: &GTO, b: &GTO, C: Vector3<f64>) -> f64 {
        a.norm
            * b.norm
            * GTO::coulomb_primitive(a.alpha, &a.l_xyz, &a.center, b.alpha, &b.l_xyz, &b.center, &C)
    }

    fn dRinvab(a: &GTO, b: &GTO, C: Vector3<f64>) -> Vector3<f64> {
        Vector3::from_fn(|mu, _| GTO::coulomb_d(a, b, &C, mu)) * (a.norm * b.norm)
    }

    fn ddRinvab(a: &GTO, b: &GTO, C: Vector3<f64>) -> Matrix3<f64> {
        Matrix3::from_fn(|mu, nu| GTO::coulomb_dd(a, b, &C, mu, nu)) * (a.norm * b.norm)
    }

    fn dRinvdab(a: &GTO, b: &GTO, C: Vector3<f64>) -> Matrix3<f64> {
        Matrix3::from_fn(|mu, nu| GTO::coulomb_d_d(a, b, &C, mu, nu)) * (a.norm * b.norm)
    }
}
