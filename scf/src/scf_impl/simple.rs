//! Simple implementation of the SCF trait (Restricted Hartree-Fock)

extern crate nalgebra as na;

use super::{Density, ScfState, Veff, SCF};
use crate::error::{Result, ScfError};
use basis::basis::{AOBasis, Basis};
use na::{DMatrix, Vector3};
use periodic_table_on_an_enum::Element;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SimpleSCF<B: AOBasis> {
    pub num_atoms: usize,
    pub num_basis: usize,
    ao_basis: Vec<B>,
    mo_basis: Vec<Arc<B::BasisType>>,
    pub coords: Vec<Vector3<f64>>,
    pub elems: Vec<Element>,
    pub charge: i32,
    h_core: DMatrix<f64>,
    overlap_matrix: DMatrix<f64>,
    /// (ij|kl), row-major over all four indices
    eri: Vec<f64>,
    state: ScfState,
}

impl<B> SimpleSCF<B>
where
    B: AOBasis + Clone,
    B::BasisType: Send + Sync,
{
    pub fn new() -> SimpleSCF<B> {
        SimpleSCF {
            num_atoms: 0,
            num_basis: 0,
            ao_basis: Vec::new(),
            mo_basis: Vec::new(),
            coords: Vec::new(),
            elems: Vec::new(),
            charge: 0,
            h_core: DMatrix::zeros(0, 0),
            overlap_matrix: DMatrix::zeros(0, 0),
            eri: Vec::new(),
            state: ScfState::default(),
        }
    }

    pub fn set_charge(&mut self, charge: i32) {
        self.charge = charge;
    }

    /// Assigns one copy of the element's basis block to every atom.
    pub fn init_basis(&mut self, elems: &[Element], basis: &HashMap<&str, &B>) -> Result<()> {
        self.ao_basis = elems
            .iter()
            .map(|elem| {
                basis
                    .get(elem.get_symbol())
                    .map(|b| (*b).clone())
                    .ok_or_else(|| {
                        ScfError::InvalidConfiguration(format!(
                            "no basis set for element {}",
                            elem.get_symbol()
                        ))
                    })
            })
            .collect::<Result<Vec<B>>>()?;
        self.elems = elems.to_vec();
        self.num_atoms = elems.len();
        Ok(())
    }

    /// Places the basis blocks on the atoms and evaluates the AO integrals.
    pub fn init_geometry(&mut self, coords: &[Vector3<f64>]) -> Result<()> {
        if coords.len() != self.num_atoms {
            return Err(ScfError::DimensionMismatch(format!(
                "{} coordinates for {} atoms",
                coords.len(),
                self.num_atoms
            )));
        }
        self.coords = coords.to_vec();

        self.mo_basis.clear();
        for (ao, center) in self.ao_basis.iter_mut().zip(coords) {
            ao.set_center(*center);
            self.mo_basis.extend(ao.get_basis());
        }
        self.num_basis = self.mo_basis.len();
        self.state.density = DMatrix::zeros(self.num_basis, self.num_basis);

        self.init_integrals();
        Ok(())
    }

    fn init_integrals(&mut self) {
        let n = self.num_basis;
        info!("Computing one-electron integrals for {} basis functions", n);

        let mo_basis = &self.mo_basis;
        let nuclei = self.nuclei();
        let ij_pairs: Vec<(usize, usize)> =
            (0..n).flat_map(|i| (0..n).map(move |j| (i, j))).collect();

        let one_electron: Vec<(f64, f64)> = ij_pairs
            .par_iter()
            .map(|&(i, j)| {
                let (a, b) = (&mo_basis[i], &mo_basis[j]);
                let kinetic = B::BasisType::Tab(a, b);
                let nuclear: f64 = nuclei
                    .iter()
                    .map(|(z, r)| B::BasisType::Vab(a, b, *r, *z as u32))
                    .sum();
                (B::BasisType::Sab(a, b), kinetic + nuclear)
            })
            .collect();

        self.overlap_matrix = DMatrix::from_fn(n, n, |i, j| one_electron[i * n + j].0);
        self.h_core = DMatrix::from_fn(n, n, |i, j| one_electron[i * n + j].1);

        info!("Computing two-electron integrals");
        // unique quartets under the 8-fold permutational symmetry
        let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (0..=i).map(move |j| (i, j))).collect();
        let quartets: Vec<(usize, usize)> = (0..pairs.len())
            .flat_map(|p| (0..=p).map(move |q| (p, q)))
            .collect();

        let values: Vec<f64> = quartets
            .par_iter()
            .map(|&(p, q)| {
                let (i, j) = pairs[p];
                let (k, l) = pairs[q];
                B::BasisType::JKabcd(&mo_basis[i], &mo_basis[j], &mo_basis[k], &mo_basis[l])
            })
            .collect();

        self.eri = vec![0.0; n.pow(4)];
        for (&(p, q), &v) in quartets.iter().zip(&values) {
            let (i, j) = pairs[p];
            let (k, l) = pairs[q];
            for (a, b, c, d) in [
                (i, j, k, l),
                (j, i, k, l),
                (i, j, l, k),
                (j, i, l, k),
                (k, l, i, j),
                (l, k, i, j),
                (k, l, j, i),
                (l, k, j, i),
            ] {
                self.eri[((a * n + b) * n + c) * n + d] = v;
            }
        }
    }

    pub fn basis_functions(&self) -> &[Arc<B::BasisType>] {
        &self.mo_basis
    }

    /// Nuclear charges and positions, in atom order.
    pub fn nuclei(&self) -> Vec<(f64, Vector3<f64>)> {
        self.elems
            .iter()
            .zip(&self.coords)
            .map(|(e, r)| (e.get_atomic_number() as f64, *r))
            .collect()
    }

    pub fn n_electrons(&self) -> usize {
        let z: i32 = self.elems.iter().map(|e| e.get_atomic_number() as i32).sum();
        (z - self.charge).max(0) as usize
    }
}

impl<B> Default for SimpleSCF<B>
where
    B: AOBasis + Clone,
    B::BasisType: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<B> SCF for SimpleSCF<B>
where
    B: AOBasis + Clone,
    B::BasisType: Send + Sync,
{
    fn name(&self) -> &str {
        "RHF"
    }

    fn state(&self) -> &ScfState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ScfState {
        &mut self.state
    }

    fn get_hcore(&self) -> DMatrix<f64> {
        self.h_core.clone()
    }

    fn get_ovlp(&self) -> DMatrix<f64> {
        self.overlap_matrix.clone()
    }

    fn energy_nuc(&self) -> f64 {
        let mut e = 0.0;
        for i in 0..self.num_atoms {
            for j in (i + 1)..self.num_atoms {
                let z_i = self.elems[i].get_atomic_number() as f64;
                let z_j = self.elems[j].get_atomic_number() as f64;
                let r_ij = (self.coords[i] - self.coords[j]).norm();
                if r_ij > 1e-10 {
                    e += z_i * z_j / r_ij;
                }
            }
        }
        e
    }

    /// `J - K/2` of the spin-summed density.
    fn get_veff(&mut self, density: Density<'_>) -> Result<Veff> {
        let n = self.num_basis;
        let p = density.total();
        if p.nrows() != n || p.ncols() != n {
            return Err(ScfError::DimensionMismatch(format!(
                "density is {}x{}, basis has {} functions",
                p.nrows(),
                p.ncols(),
                n
            )));
        }

        let eri = &self.eri;
        let idx = |i: usize, j: usize, k: usize, l: usize| ((i * n + j) * n + k) * n + l;
        let g_values: Vec<f64> = (0..n * n)
            .into_par_iter()
            .map(|ij| {
                let (i, j) = (ij / n, ij % n);
                let mut g_ij = 0.0;
                for k in 0..n {
                    for l in 0..n {
                        let coulomb = eri[idx(i, j, k, l)];
                        let exchange = eri[idx(i, k, j, l)];
                        g_ij += p[(k, l)] * (coulomb - 0.5 * exchange);
                    }
                }
                g_ij
            })
            .collect();

        Ok(Veff::new(DMatrix::from_row_slice(n, n, &g_values)))
    }

    fn energy_elec(
        &mut self,
        density: Density<'_>,
        h_core: &DMatrix<f64>,
        veff: &Veff,
    ) -> Result<(f64, f64)> {
        let p = density.total();
        if p.shape() != h_core.shape() || p.shape() != veff.matrix.shape() {
            return Err(ScfError::DimensionMismatch(
                "density, core Hamiltonian and potential differ in shape".to_string(),
            ));
        }
        let e1 = p.dot(h_core);
        let e_coul = 0.5 * p.dot(&veff.matrix);
        Ok((e1 + e_coul, e_coul))
    }

    fn make_rdm1(&self, mo_coeff: &DMatrix<f64>) -> DMatrix<f64> {
        let n_occ = (self.n_electrons() / 2).min(mo_coeff.ncols());
        let occupied = mo_coeff.columns(0, n_occ);
        2.0 * &occupied * occupied.transpose()
    }

    fn dump_flags(&self) -> Result<()> {
        if self.num_basis == 0 {
            return Err(ScfError::InvalidConfiguration(
                "no basis functions; call init_basis and init_geometry first".to_string(),
            ));
        }
        if self.n_electrons() % 2 != 0 {
            return Err(ScfError::InvalidConfiguration(format!(
                "RHF needs an even number of electrons, got {}",
                self.n_electrons()
            )));
        }
        info!("******** {} flags ********", self.name());
        info!("  atoms = {}, basis functions = {}", self.num_atoms, self.num_basis);
        info!("  electrons = {}, charge = {}", self.n_electrons(), self.charge);
        info!("  max_cycle = {}", self.state.max_cycle);
        info!("  convergence_threshold = {:e}", self.state.convergence_threshold);
        info!("  density_mixing = {}", self.state.density_mixing);
        info!("  diis_subspace_size = {}", self.state.diis_subspace_size);
        Ok(())
    }
}
