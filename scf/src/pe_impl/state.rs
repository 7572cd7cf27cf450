//! Classical side of the embedding: static multipole and nuclear interactions and
//! the induced dipoles of the polarizable sites.

use super::multipole::{
    components, potential_derivatives, site_field, symmetry_factor, t2_matrix, Potential,
};
use super::options::PeOptions;
use crate::error::{Result, ScfError};
use nalgebra::{DVector, Matrix3, Vector3};
use std::fmt;

/// A nucleus of the quantum region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    pub charge: f64,
    pub position: Vector3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyCategory {
    Electrostatic,
    Polarization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergySource {
    Electronic,
    Nuclear,
    Multipoles,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyTerms {
    pub electronic: f64,
    pub nuclear: f64,
    pub multipoles: f64,
}

impl EnergyTerms {
    pub fn total(&self) -> f64 {
        self.electronic + self.nuclear + self.multipoles
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Energies {
    pub electrostatic: EnergyTerms,
    pub polarization: EnergyTerms,
}

impl Energies {
    pub fn total(&self) -> f64 {
        self.electrostatic.total() + self.polarization.total()
    }

    fn terms(&self, category: EnergyCategory) -> &EnergyTerms {
        match category {
            EnergyCategory::Electrostatic => &self.electrostatic,
            EnergyCategory::Polarization => &self.polarization,
        }
    }

    pub fn get(&self, category: EnergyCategory, source: EnergySource) -> f64 {
        let terms = self.terms(category);
        match source {
            EnergySource::Electronic => terms.electronic,
            EnergySource::Nuclear => terms.nuclear,
            EnergySource::Multipoles => terms.multipoles,
        }
    }

    pub fn get_mut(&mut self, category: EnergyCategory, source: EnergySource) -> &mut f64 {
        let terms = match category {
            EnergyCategory::Electrostatic => &mut self.electrostatic,
            EnergyCategory::Polarization => &mut self.polarization,
        };
        match source {
            EnergySource::Electronic => &mut terms.electronic,
            EnergySource::Nuclear => &mut terms.nuclear,
            EnergySource::Multipoles => &mut terms.multipoles,
        }
    }
}

impl fmt::Display for Energies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Polarizable Embedding: Energy Contributions")?;
        for (name, terms) in [
            ("Electrostatics", &self.electrostatic),
            ("Polarization", &self.polarization),
        ] {
            writeln!(f, "  {}:", name)?;
            writeln!(f, "    Electronic:  {:20.12}", terms.electronic)?;
            writeln!(f, "    Nuclear:     {:20.12}", terms.nuclear)?;
            writeln!(f, "    Multipole:   {:20.12}", terms.multipoles)?;
            writeln!(f, "    Total:       {:20.12}", terms.total())?;
        }
        write!(f, "  Total PE energy: {:20.12}", self.total())
    }
}

/// Operations the kernel needs from a classical embedding solver.
///
/// Every per-site vector (fields in, induced moments out) is laid out in the
/// order of [`EmbeddingState::polarizable_site_indices`], three components per site.
pub trait EmbeddingState {
    fn calculate_static_energies_and_fields(&mut self) -> Result<()>;

    fn potentials(&self) -> &[Potential];

    /// Stable identifiers (`Potential::index`) of the polarizable sites, in order of appearance.
    fn polarizable_site_indices(&self) -> Vec<usize> {
        self.potentials()
            .iter()
            .filter(|p| p.is_polarizable())
            .map(|p| p.index)
            .collect()
    }

    fn polarizable_site_number(&self) -> usize {
        self.polarizable_site_indices().len()
    }

    /// Solves for the induced dipoles given the electronic field at each polarizable site.
    fn update_induced_moments(&mut self, elec_fields: &DVector<f64>, elec_only: bool)
        -> Result<()>;

    fn induced_moments(&self) -> DVector<f64>;

    fn energies(&self) -> &Energies;
    fn energies_mut(&mut self) -> &mut Energies;

    fn total_energy(&self) -> f64 {
        self.energies().total()
    }

    fn check_sanity(&self) -> Result<()>;

    fn dump_flags(&self);
}

pub type Printer = Box<dyn Fn(&str) + Send + Sync>;

pub struct ClassicalEmbedding {
    options: PeOptions,
    atoms: Vec<Atom>,
    potentials: Vec<Potential>,
    // positions into `potentials`, polarizable sites only
    polarizable: Vec<usize>,
    nuclear_fields: DVector<f64>,
    multipole_fields: DVector<f64>,
    induced_moments: DVector<f64>,
    energies: Energies,
    printer: Printer,
}

impl fmt::Debug for ClassicalEmbedding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassicalEmbedding")
            .field("options", &self.options)
            .field("atoms", &self.atoms)
            .field("potentials", &self.potentials.len())
            .field("energies", &self.energies)
            .finish()
    }
}

impl ClassicalEmbedding {
    pub fn new(options: PeOptions, atoms: Vec<Atom>, printer: Printer) -> Result<Self> {
        let potentials = options.build_potentials()?;
        let polarizable: Vec<usize> = potentials
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_polarizable())
            .map(|(pos, _)| pos)
            .collect();
        let n = 3 * polarizable.len();
        Ok(ClassicalEmbedding {
            options,
            atoms,
            potentials,
            polarizable,
            nuclear_fields: DVector::zeros(n),
            multipole_fields: DVector::zeros(n),
            induced_moments: DVector::zeros(0),
            energies: Energies::default(),
            printer,
        })
    }

    pub fn options(&self) -> &PeOptions {
        &self.options
    }

    pub fn nuclear_fields(&self) -> &DVector<f64> {
        &self.nuclear_fields
    }

    pub fn multipole_fields(&self) -> &DVector<f64> {
        &self.multipole_fields
    }

    fn polarizabilities(&self) -> Vec<Matrix3<f64>> {
        self.polarizable
            .iter()
            .map(|&pos| self.potentials[pos].polarizability.unwrap_or_else(Matrix3::zeros))
            .collect()
    }

    /// Jacobi iterations on `μ_i = α_i (F_i + Σ_j T2_ij μ_j)`.
    fn solve_induced(&self, fields: &DVector<f64>) -> Result<(DVector<f64>, usize)> {
        let n = self.polarizable.len();
        let alphas = self.polarizabilities();

        // dipole-dipole couplings, None where excluded
        let couplings: Vec<Vec<Option<Matrix3<f64>>>> = self
            .polarizable
            .iter()
            .map(|&pi| {
                let site_i = &self.potentials[pi];
                self.polarizable
                    .iter()
                    .map(|&pj| {
                        let site_j = &self.potentials[pj];
                        (!site_i.excludes(site_j))
                            .then(|| t2_matrix(&(site_i.position - site_j.position)))
                    })
                    .collect()
            })
            .collect();

        let mut mu = if self.induced_moments.len() == 3 * n {
            self.induced_moments.clone()
        } else {
            let mut guess = DVector::zeros(3 * n);
            for (i, alpha) in alphas.iter().enumerate() {
                guess
                    .fixed_rows_mut::<3>(3 * i)
                    .copy_from(&(alpha * fields.fixed_rows::<3>(3 * i)));
            }
            guess
        };

        let mut residual = f64::INFINITY;
        for iteration in 1..=self.options.maxiter {
            let mut next = DVector::zeros(3 * n);
            for i in 0..n {
                let mut f_i: Vector3<f64> = fields.fixed_rows::<3>(3 * i).into_owned();
                for (j, coupling) in couplings[i].iter().enumerate() {
                    if let Some(t) = coupling {
                        f_i += t * mu.fixed_rows::<3>(3 * j);
                    }
                }
                next.fixed_rows_mut::<3>(3 * i).copy_from(&(alphas[i] * f_i));
            }
            residual = (&next - &mu).amax();
            mu = next;
            if residual < self.options.induced_thresh {
                return Ok((mu, iteration));
            }
        }

        Err(ScfError::InducedNotConverged {
            iterations: self.options.maxiter,
            residual,
        })
    }
}

impl EmbeddingState for ClassicalEmbedding {
    fn calculate_static_energies_and_fields(&mut self) -> Result<()> {
        let mut nuclear_energy = 0.0;
        for atom in &self.atoms {
            for site in &self.potentials {
                nuclear_energy += atom.charge * potential_derivatives(site, &atom.position, 0)[0];
            }
        }

        let mut multipole_energy = 0.0;
        for (i, site_i) in self.potentials.iter().enumerate() {
            for site_j in self.potentials.iter().skip(i + 1) {
                if site_i.excludes(site_j) {
                    continue;
                }
                // multipoles of i in the potential of j
                for m in &site_i.multipoles {
                    let derivatives = potential_derivatives(site_j, &site_i.position, m.k);
                    let taylor = 1.0 / (1..=m.k).fold(1.0, |acc, x| acc * x as f64);
                    multipole_energy += components(m.k)
                        .into_iter()
                        .zip(&m.values)
                        .zip(&derivatives)
                        .map(|((c, value), d)| taylor * symmetry_factor(c) * value * d)
                        .sum::<f64>();
                }
            }
        }

        for (slot, &pos) in self.polarizable.iter().enumerate() {
            let site = &self.potentials[pos];
            let nuclear: Vector3<f64> = self
                .atoms
                .iter()
                .map(|atom| {
                    let r = site.position - atom.position;
                    r * (atom.charge / r.norm().powi(3))
                })
                .sum();
            let multipole: Vector3<f64> = self
                .potentials
                .iter()
                .filter(|other| !site.excludes(other))
                .map(|other| site_field(other, &site.position))
                .sum();
            self.nuclear_fields.fixed_rows_mut::<3>(3 * slot).copy_from(&nuclear);
            self.multipole_fields.fixed_rows_mut::<3>(3 * slot).copy_from(&multipole);
        }

        self.energies.electrostatic.nuclear = nuclear_energy;
        self.energies.electrostatic.multipoles = multipole_energy;
        (self.printer)(&format!(
            "Static electrostatics: nuclear = {:.12}, multipoles = {:.12}",
            nuclear_energy, multipole_energy
        ));
        Ok(())
    }

    fn potentials(&self) -> &[Potential] {
        &self.potentials
    }

    fn polarizable_site_indices(&self) -> Vec<usize> {
        self.polarizable
            .iter()
            .map(|&pos| self.potentials[pos].index)
            .collect()
    }

    fn update_induced_moments(
        &mut self,
        elec_fields: &DVector<f64>,
        elec_only: bool,
    ) -> Result<()> {
        let n = 3 * self.polarizable.len();
        if elec_fields.len() != n {
            return Err(ScfError::DimensionMismatch(format!(
                "{} field components for {} polarizable sites",
                elec_fields.len(),
                self.polarizable.len()
            )));
        }

        let total_fields = if elec_only {
            elec_fields.clone()
        } else {
            elec_fields + &self.nuclear_fields + &self.multipole_fields
        };
        let (mu, iterations) = self.solve_induced(&total_fields)?;
        (self.printer)(&format!("Induced moments converged in {} iterations", iterations));

        let pol = &mut self.energies.polarization;
        pol.electronic = -0.5 * mu.dot(elec_fields);
        if elec_only {
            pol.nuclear = 0.0;
            pol.multipoles = 0.0;
        } else {
            pol.nuclear = -0.5 * mu.dot(&self.nuclear_fields);
            pol.multipoles = -0.5 * mu.dot(&self.multipole_fields);
        }
        self.induced_moments = mu;
        Ok(())
    }

    fn induced_moments(&self) -> DVector<f64> {
        if self.induced_moments.len() == 3 * self.polarizable.len() {
            self.induced_moments.clone()
        } else {
            DVector::zeros(3 * self.polarizable.len())
        }
    }

    fn energies(&self) -> &Energies {
        &self.energies
    }

    fn energies_mut(&mut self) -> &mut Energies {
        &mut self.energies
    }

    fn check_sanity(&self) -> Result<()> {
        for (i, a) in self.potentials.iter().enumerate() {
            for b in self.potentials.iter().skip(i + 1) {
                if !a.excludes(b) && (a.position - b.position).norm() < 1e-8 {
                    return Err(ScfError::InvalidConfiguration(format!(
                        "sites {} and {} coincide but do not exclude each other",
                        a.index, b.index
                    )));
                }
            }
            for atom in &self.atoms {
                if (a.position - atom.position).norm() < 1e-8 {
                    return Err(ScfError::InvalidConfiguration(format!(
                        "site {} sits on a nucleus",
                        a.index
                    )));
                }
            }
        }
        Ok(())
    }

    fn dump_flags(&self) {
        let max_order = self
            .potentials
            .iter()
            .filter_map(|p| p.max_order())
            .max()
            .map_or_else(|| "-".to_string(), |k| k.to_string());
        (self.printer)(&format!(
            "  sites = {}, polarizable = {}, highest multipole order = {}",
            self.potentials.len(),
            self.polarizable.len(),
            max_order
        ));
        (self.printer)(&format!(
            "  induced_thresh = {:e}, maxiter = {}, iso_pol = {}",
            self.options.induced_thresh, self.options.maxiter, self.options.iso_pol
        ));
    }
}
