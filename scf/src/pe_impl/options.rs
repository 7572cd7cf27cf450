//! Embedding input as it appears under `embedding:` in the YAML configuration.

use super::multipole::{symmetric_from_components, Multipole, Potential};
use crate::error::{Result, ScfError};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

fn default_induced_thresh() -> f64 {
    1e-8
}

fn default_maxiter() -> usize {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeOptions {
    /// Convergence threshold on the largest change of an induced dipole component
    #[serde(default = "default_induced_thresh")]
    pub induced_thresh: f64,

    /// Maximum number of induced dipole iterations
    #[serde(default = "default_maxiter")]
    pub maxiter: usize,

    /// Replace every polarizability by its isotropic average
    #[serde(default)]
    pub iso_pol: bool,

    /// Environment sites, positions in bohr
    #[serde(default)]
    pub potentials: Vec<SiteConfig>,
}

impl Default for PeOptions {
    fn default() -> Self {
        PeOptions {
            induced_thresh: default_induced_thresh(),
            maxiter: default_maxiter(),
            iso_pol: false,
            potentials: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub label: Option<String>,
    pub position: [f64; 3],
    #[serde(default)]
    pub multipoles: Vec<MultipoleConfig>,
    #[serde(default)]
    pub polarizability: Option<PolarizabilityConfig>,
    /// Indices (0-based, input order) of sites this one does not interact with
    #[serde(default)]
    pub exclusions: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipoleConfig {
    pub order: usize,
    pub values: Vec<f64>,
}

/// Either a single isotropic value or XX, XY, XZ, YY, YZ, ZZ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolarizabilityConfig {
    Isotropic(f64),
    Tensor([f64; 6]),
}

impl PolarizabilityConfig {
    pub fn to_matrix(&self) -> Matrix3<f64> {
        match self {
            PolarizabilityConfig::Isotropic(a) => Matrix3::identity() * *a,
            PolarizabilityConfig::Tensor(c) => symmetric_from_components(c),
        }
    }
}

impl PeOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.induced_thresh.is_finite() && self.induced_thresh > 0.0) {
            return Err(ScfError::InvalidConfiguration(format!(
                "induced_thresh must be positive, got {}",
                self.induced_thresh
            )));
        }
        if self.maxiter == 0 {
            return Err(ScfError::InvalidConfiguration(
                "maxiter must be at least 1".to_string(),
            ));
        }

        let n_sites = self.potentials.len();
        for (i, site) in self.potentials.iter().enumerate() {
            if site.position.iter().any(|x| !x.is_finite()) {
                return Err(ScfError::InvalidConfiguration(format!(
                    "site {} has a non-finite position",
                    i
                )));
            }
            if let Some(&bad) = site.exclusions.iter().find(|&&j| j >= n_sites || j == i) {
                return Err(ScfError::InvalidConfiguration(format!(
                    "site {} has invalid exclusion {}",
                    i, bad
                )));
            }
            let mut orders: Vec<usize> = site.multipoles.iter().map(|m| m.order).collect();
            orders.sort_unstable();
            if orders.windows(2).any(|w| w[0] == w[1]) {
                return Err(ScfError::InvalidConfiguration(format!(
                    "site {} lists a multipole order twice",
                    i
                )));
            }
            if let Some(pol) = &site.polarizability {
                if pol.to_matrix().iter().any(|x| !x.is_finite()) {
                    return Err(ScfError::InvalidConfiguration(format!(
                        "site {} has a non-finite polarizability",
                        i
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validated sites, indexed by input order. Rank-2 moments come back traceless.
    pub fn build_potentials(&self) -> Result<Vec<Potential>> {
        self.validate()?;
        self.potentials
            .iter()
            .enumerate()
            .map(|(index, site)| {
                let multipoles = site
                    .multipoles
                    .iter()
                    .map(|m| Multipole::new(m.order, m.values.clone()))
                    .collect::<Result<Vec<_>>>()?;
                let polarizability = site.polarizability.as_ref().map(|p| {
                    let alpha = p.to_matrix();
                    if self.iso_pol {
                        Matrix3::identity() * (alpha.trace() / 3.0)
                    } else {
                        alpha
                    }
                });
                Ok(Potential {
                    index,
                    label: site.label.clone(),
                    position: Vector3::from(site.position),
                    multipoles,
                    polarizability,
                    exclusions: site.exclusions.clone(),
                })
            })
            .collect()
    }
}
