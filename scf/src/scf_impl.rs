//! SCF capability trait, DIIS and the data passed between an SCF loop and its hooks
//!
//! The loop in [`SCF::scf_cycle`] only talks to the solver through the overridable
//! hooks (`get_veff`, `energy_elec`, `make_rdm1`, ...), so a wrapper implementing
//! [`SCF`] by composition changes the behaviour of every iteration without touching
//! the loop itself.

extern crate nalgebra as na;

mod simple;

pub use simple::SimpleSCF;

use crate::error::{Result, ScfError};
use na::{DMatrix, DVector, Vector3};
use std::cmp::Ordering;
use tracing::{info, warn};

/// One-particle density in the AO basis.
#[derive(Debug, Clone, Copy)]
pub enum Density<'a> {
    Restricted(&'a DMatrix<f64>),
    Unrestricted {
        alpha: &'a DMatrix<f64>,
        beta: &'a DMatrix<f64>,
    },
}

impl Density<'_> {
    /// Spin-summed density.
    pub fn total(&self) -> DMatrix<f64> {
        match self {
            Density::Restricted(d) => (*d).clone(),
            Density::Unrestricted { alpha, beta } => *alpha + *beta,
        }
    }

    pub fn nao(&self) -> usize {
        match self {
            Density::Restricted(d) => d.nrows(),
            Density::Unrestricted { alpha, .. } => alpha.nrows(),
        }
    }
}

/// Energy and potential an embedding added to a [`Veff`] during this iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingContribution {
    pub energy: f64,
    pub potential: DMatrix<f64>,
}

/// Effective potential returned by [`SCF::get_veff`].
///
/// `embedding` is present only when an embedding was evaluated for this call; the
/// matrix then already includes `embedding.potential`.
#[derive(Debug, Clone, PartialEq)]
pub struct Veff {
    pub matrix: DMatrix<f64>,
    pub embedding: Option<EmbeddingContribution>,
}

impl Veff {
    pub fn new(matrix: DMatrix<f64>) -> Self {
        Veff {
            matrix,
            embedding: None,
        }
    }

    pub fn is_tagged(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Mutable attributes of an SCF run, shared by a host and any wrapper around it.
#[derive(Debug, Clone)]
pub struct ScfState {
    pub max_cycle: usize,
    /// Energy convergence threshold in Hartree
    pub convergence_threshold: f64,
    pub density_mixing: f64,
    /// 0 disables DIIS
    pub diis_subspace_size: usize,
    pub mo_coeff: DMatrix<f64>,
    pub mo_energy: DVector<f64>,
    pub density: DMatrix<f64>,
    pub e_tot: f64,
    pub converged: bool,
    pub cycles: usize,
}

impl Default for ScfState {
    fn default() -> Self {
        ScfState {
            max_cycle: 100,
            convergence_threshold: 1e-6,
            density_mixing: 0.5,
            diis_subspace_size: 8,
            mo_coeff: DMatrix::zeros(0, 0),
            mo_energy: DVector::zeros(0),
            density: DMatrix::zeros(0, 0),
            e_tot: 0.0,
            converged: false,
            cycles: 0,
        }
    }
}

/// The SCF trait defines the interface for Self-Consistent Field calculations
pub trait SCF {
    fn name(&self) -> &str;

    fn state(&self) -> &ScfState;
    fn state_mut(&mut self) -> &mut ScfState;

    fn get_hcore(&self) -> DMatrix<f64>;
    fn get_ovlp(&self) -> DMatrix<f64>;
    fn energy_nuc(&self) -> f64;

    /// Two-electron (and any additional) potential for `density`.
    fn get_veff(&mut self, density: Density<'_>) -> Result<Veff>;

    /// Electronic energy and its Coulomb-like part for the given density and potential.
    fn energy_elec(
        &mut self,
        density: Density<'_>,
        h_core: &DMatrix<f64>,
        veff: &Veff,
    ) -> Result<(f64, f64)>;

    fn make_rdm1(&self, mo_coeff: &DMatrix<f64>) -> DMatrix<f64>;

    fn dump_flags(&self) -> Result<()>;

    fn nuc_grad(&mut self) -> Result<Vec<Vector3<f64>>> {
        Err(ScfError::Unimplemented(format!(
            "Nuclear gradients not implemented for {}.",
            self.name()
        )))
    }

    fn energy_tot(
        &mut self,
        density: Density<'_>,
        h_core: &DMatrix<f64>,
        veff: &Veff,
    ) -> Result<f64> {
        let (e_elec, _) = self.energy_elec(density, h_core, veff)?;
        Ok(e_elec + self.energy_nuc())
    }

    /// Solves `F C = S C e`, orbitals sorted by energy.
    fn eig(&self, fock: &DMatrix<f64>, overlap: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
        solve_roothaan_hall(fock, overlap)
    }

    /// Runs the SCF iterations and returns the total energy.
    ///
    /// Every iteration calls `get_veff` once for the new density followed by
    /// `energy_tot`, so a wrapper can pair the two calls.
    fn scf_cycle(&mut self) -> Result<f64> {
        self.dump_flags()?;

        let h_core = self.get_hcore();
        let overlap = self.get_ovlp();
        let nao = h_core.nrows();
        let (max_cycle, threshold, mixing, diis_size) = {
            let state = self.state();
            (
                state.max_cycle,
                state.convergence_threshold,
                state.density_mixing,
                state.diis_subspace_size,
            )
        };
        let mut diis = (diis_size > 0).then(|| DIIS::new(diis_size));

        let mut density = {
            let guess = &self.state().density;
            if guess.nrows() == nao && guess.iter().any(|&x| x != 0.0) {
                guess.clone()
            } else {
                info!("Using core Hamiltonian initial guess");
                let (_, mo_coeff) = self.eig(&h_core, &overlap);
                self.make_rdm1(&mo_coeff)
            }
        };

        let mut veff = self.get_veff(Density::Restricted(&density))?;
        let mut e_tot = self.energy_tot(Density::Restricted(&density), &h_core, &veff)?;
        info!("Initial energy: {:.12} au", e_tot);

        let mut converged = false;
        for cycle in 0..max_cycle {
            let mut fock = &h_core + &veff.matrix;

            if let Some(diis) = diis.as_mut() {
                diis.update(fock.clone(), &density, &overlap);
                if diis.size() >= 2 {
                    if let Some(fock_diis) = diis.extrapolate() {
                        fock = fock_diis;
                    }
                }
            }

            let (mo_energy, mo_coeff) = self.eig(&fock, &overlap);
            let new_density = self.make_rdm1(&mo_coeff);
            density = mixing * new_density + (1.0 - mixing) * density;

            veff = self.get_veff(Density::Restricted(&density))?;
            let e_new = self.energy_tot(Density::Restricted(&density), &h_core, &veff)?;
            let energy_change = e_new - e_tot;
            e_tot = e_new;

            info!("Cycle {}: E = {:.12} au, dE = {:.12} au", cycle, e_tot, energy_change);

            let state = self.state_mut();
            state.mo_coeff = mo_coeff;
            state.mo_energy = mo_energy;
            state.cycles = cycle + 1;

            if energy_change.abs() < threshold {
                info!("SCF converged in {} cycles.", cycle + 1);
                converged = true;
                break;
            }
        }

        if !converged {
            warn!("SCF not converged after {} cycles", max_cycle);
        }

        let state = self.state_mut();
        state.density = density;
        state.e_tot = e_tot;
        state.converged = converged;
        info!("Final energy: {:.12} au", e_tot);
        Ok(e_tot)
    }
}

/// DIIS (Direct Inversion in the Iterative Subspace) convergence accelerator
///
/// The error vector of a Fock matrix is the commutator `FDS - SDF`; the
/// extrapolated Fock matrix `Σ c_i F_i` minimizes `|Σ c_i e_i|²` subject to `Σ c_i = 1`.
#[derive(Clone)]
pub struct DIIS {
    error_matrices: Vec<DMatrix<f64>>,
    fock_matrices: Vec<DMatrix<f64>>,
    max_subspace_size: usize,
}

impl DIIS {
    pub fn new(max_subspace_size: usize) -> Self {
        DIIS {
            error_matrices: Vec::new(),
            fock_matrices: Vec::new(),
            max_subspace_size,
        }
    }

    pub fn calculate_error_matrix(
        &self,
        fock: &DMatrix<f64>,
        density: &DMatrix<f64>,
        overlap: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        fock * density * overlap - overlap * density * fock
    }

    /// Adds a Fock matrix to the subspace, dropping the oldest one when full.
    pub fn update(
        &mut self,
        fock_matrix: DMatrix<f64>,
        density_matrix: &DMatrix<f64>,
        overlap_matrix: &DMatrix<f64>,
    ) {
        let error = self.calculate_error_matrix(&fock_matrix, density_matrix, overlap_matrix);

        if self.error_matrices.len() >= self.max_subspace_size {
            self.error_matrices.remove(0);
            self.fock_matrices.remove(0);
        }

        self.error_matrices.push(error);
        self.fock_matrices.push(fock_matrix);
    }

    /// Returns None if the DIIS equations are singular.
    pub fn extrapolate(&self) -> Option<DMatrix<f64>> {
        let n = self.error_matrices.len();
        if n == 0 {
            return None;
        }

        let mut b = DMatrix::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in 0..n {
                b[(i, j)] = self.error_matrices[i].dot(&self.error_matrices[j]);
            }
            b[(i, n)] = -1.0;
            b[(n, i)] = -1.0;
        }

        let mut rhs = DVector::zeros(n + 1);
        rhs[n] = -1.0;

        let coeffs = match b.lu().solve(&rhs) {
            Some(x) => x,
            None => {
                info!("DIIS extrapolation failed: singular B matrix");
                return None;
            }
        };

        let mut fock_extrapolated =
            DMatrix::zeros(self.fock_matrices[0].nrows(), self.fock_matrices[0].ncols());
        for (fock, c) in self.fock_matrices.iter().zip(coeffs.iter()) {
            fock_extrapolated += fock * *c;
        }
        Some(fock_extrapolated)
    }

    pub fn reset(&mut self) {
        self.error_matrices.clear();
        self.fock_matrices.clear();
    }

    pub fn size(&self) -> usize {
        self.error_matrices.len()
    }
}

/// Flips each eigenvector so that its largest-magnitude entry is positive.
pub fn align_eigenvectors(mut eigvecs: DMatrix<f64>) -> DMatrix<f64> {
    for mut col in eigvecs.column_iter_mut() {
        let max_val = col
            .iter()
            .copied()
            .max_by(|a, b| a.abs().partial_cmp(&b.abs()).unwrap_or(Ordering::Less))
            .unwrap_or(0.0);
        if max_val < 0.0 {
            col.neg_mut();
        }
    }
    eigvecs
}

/// Symmetric orthogonalizer `S^{-1/2}`, dropping near-singular directions.
pub fn orthogonalizer(overlap: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = overlap.clone().symmetric_eigen();
    let inv_sqrt_vals = eig
        .eigenvalues
        .map(|val| if val > 1e-10 { 1.0 / val.sqrt() } else { 0.0 });
    &eig.eigenvectors * DMatrix::from_diagonal(&inv_sqrt_vals) * eig.eigenvectors.transpose()
}

pub fn solve_roothaan_hall(
    fock: &DMatrix<f64>,
    overlap: &DMatrix<f64>,
) -> (DVector<f64>, DMatrix<f64>) {
    let x = orthogonalizer(overlap);
    let f_prime = x.transpose() * fock * &x;
    let eig = f_prime.symmetric_eigen();

    let mut indices: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    indices.sort_by(|&a, &b| {
        eig.eigenvalues[a]
            .partial_cmp(&eig.eigenvalues[b])
            .unwrap_or(Ordering::Equal)
    });
    let sorted_eigenvalues = DVector::from_fn(indices.len(), |i, _| eig.eigenvalues[indices[i]]);
    let sorted_eigenvectors = eig.eigenvectors.select_columns(&indices);

    (sorted_eigenvalues, align_eigenvectors(x * sorted_eigenvectors))
}
