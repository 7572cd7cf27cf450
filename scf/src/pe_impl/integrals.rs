//! Electronic integrals of the multipole operators of a single site.

use crate::error::{Result, ScfError};
use basis::basis::Basis;
use nalgebra::{DMatrix, Vector3};
use rayon::prelude::*;
use std::sync::Arc;

/// `1/|r - C|` integrals and their derivatives over an AO basis.
///
/// Derivatives act on the electron coordinate of the bra (and ket for `iprinvip`);
/// nine-component results are row-major `xx, xy, xz, yx, ..., zz`.
pub trait MultipoleIntegralEngine {
    fn nao(&self) -> usize;
    /// `<i| 1/|r-C| |j>`
    fn int1e_rinv(&self, origin: &Vector3<f64>) -> Result<DMatrix<f64>>;
    /// `<∇i| 1/|r-C| |j>`, 3 components
    fn int1e_iprinv(&self, origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>>;
    /// `<∇∇i| 1/|r-C| |j>`, 9 components
    fn int1e_ipiprinv(&self, origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>>;
    /// `<∇i| 1/|r-C| |∇j>`, 9 components
    fn int1e_iprinvip(&self, origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>>;
}

/// Integral engine over a list of basis functions.
pub struct AoIntegrals<B: Basis> {
    basis: Vec<Arc<B>>,
}

impl<B> AoIntegrals<B>
where
    B: Basis + Send + Sync,
{
    pub fn new(basis: Vec<Arc<B>>) -> Self {
        AoIntegrals { basis }
    }

    fn elements<T, F>(&self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&B, &B) -> T + Sync,
    {
        let n = self.basis.len();
        (0..n * n)
            .into_par_iter()
            .map(|ij| f(&self.basis[ij / n], &self.basis[ij % n]))
            .collect()
    }

    fn split<const N: usize>(&self, values: &[[f64; N]]) -> Vec<DMatrix<f64>> {
        let n = self.basis.len();
        (0..N)
            .map(|c| DMatrix::from_fn(n, n, |i, j| values[i * n + j][c]))
            .collect()
    }
}

impl<B> MultipoleIntegralEngine for AoIntegrals<B>
where
    B: Basis + Send + Sync,
{
    fn nao(&self) -> usize {
        self.basis.len()
    }

    fn int1e_rinv(&self, origin: &Vector3<f64>) -> Result<DMatrix<f64>> {
        let n = self.nao();
        let values = self.elements(|a, b| B::Rinvab(a, b, *origin));
        Ok(DMatrix::from_row_slice(n, n, &values))
    }

    fn int1e_iprinv(&self, origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>> {
        let values = self.elements(|a, b| {
            let v = B::dRinvab(a, b, *origin);
            [v.x, v.y, v.z]
        });
        Ok(self.split(&values))
    }

    fn int1e_ipiprinv(&self, origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>> {
        let values = self.elements(|a, b| {
            let m = B::ddRinvab(a, b, *origin);
            std::array::from_fn::<f64, 9, _>(|c| m[(c / 3, c % 3)])
        });
        Ok(self.split(&values))
    }

    fn int1e_iprinvip(&self, origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>> {
        let values = self.elements(|a, b| {
            let m = B::dRinvdab(a, b, *origin);
            std::array::from_fn::<f64, 9, _>(|c| m[(c / 3, c % 3)])
        });
        Ok(self.split(&values))
    }
}

fn check_components(name: &str, ints: &[DMatrix<f64>], expected: usize) -> Result<()> {
    if ints.len() != expected {
        return Err(ScfError::Integral(format!(
            "{} returned {} components, expected {}",
            name,
            ints.len(),
            expected
        )));
    }
    Ok(())
}

/// Integrals of the rank-`order` multipole operator at `site`, one matrix per
/// stored component (see [`super::multipole::components`]).
///
/// Order 1 is the derivative of the potential integrals with respect to the site,
/// order 2 the second derivative with the off-diagonal pairs averaged.
pub fn multipole_integrals<E>(engine: &E, site: &Vector3<f64>, order: usize) -> Result<Vec<DMatrix<f64>>>
where
    E: MultipoleIntegralEngine + ?Sized,
{
    match order {
        0 => Ok(vec![engine.int1e_rinv(site)?]),
        1 => {
            let ip = engine.int1e_iprinv(site)?;
            check_components("int1e_iprinv", &ip, 3)?;
            Ok(ip.iter().map(|m| m + m.transpose()).collect())
        }
        2 => {
            let ipip = engine.int1e_ipiprinv(site)?;
            let ipip_r = engine.int1e_iprinvip(site)?;
            check_components("int1e_ipiprinv", &ipip, 9)?;
            check_components("int1e_iprinvip", &ipip_r, 9)?;
            let raw: Vec<DMatrix<f64>> = ipip
                .iter()
                .zip(&ipip_r)
                .map(|(m, r)| m + m.transpose() + r * 2.0)
                .collect();
            let xy = (&raw[1] + &raw[3]) * 0.5;
            let xz = (&raw[2] + &raw[6]) * 0.5;
            let yz = (&raw[5] + &raw[7]) * 0.5;
            Ok(vec![raw[0].clone(), xy, xz, raw[4].clone(), yz, raw[8].clone()])
        }
        _ => Err(ScfError::UnsupportedOrder { order }),
    }
}

/// Electric field of the electron density at `site`.
pub fn field_at_site<E>(engine: &E, site: &Vector3<f64>, density: &DMatrix<f64>) -> Result<Vector3<f64>>
where
    E: MultipoleIntegralEngine + ?Sized,
{
    let ints = multipole_integrals(engine, site, 1)?;
    Ok(Vector3::new(
        density.dot(&ints[0]),
        density.dot(&ints[1]),
        density.dot(&ints[2]),
    ))
}

/// Operator of an induced dipole `moment` at `site`.
pub fn field_operator<E>(engine: &E, site: &Vector3<f64>, moment: &Vector3<f64>) -> Result<DMatrix<f64>>
where
    E: MultipoleIntegralEngine + ?Sized,
{
    let ints = multipole_integrals(engine, site, 1)?;
    let n = engine.nao();
    Ok(ints
        .iter()
        .zip(moment.iter())
        .fold(DMatrix::zeros(n, n), |acc, (m, mu)| acc + m * (-mu)))
}
