use super::integrals::MultipoleIntegralEngine;
use super::kernel::PolEmbed;
use super::state::{ClassicalEmbedding, EmbeddingState};
use crate::error::{Result, ScfError};
use crate::scf_impl::{Density, EmbeddingContribution, ScfState, Veff, SCF};
use nalgebra::{DMatrix, Vector3};
use tracing::info;

/// Whether the embedding was already evaluated in the current SCF iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationLock {
    Unlocked,
    Locked,
}

/// An SCF solver with a polarizable embedding added to its effective potential.
///
/// The embedding is solved at most once between two `energy_elec` calls: the
/// first `get_veff` of an iteration evaluates it and tags the result, later
/// calls return the host potential untagged until `energy_elec` releases the lock.
pub struct PolEmbedScf<S, E, P = ClassicalEmbedding> {
    scf: S,
    pol_embed: PolEmbed<E, P>,
    name: String,
    lock: IterationLock,
    pe_energy: f64,
}

/// Wraps `scf`, keeping all of its state, with `pol_embed`.
pub fn pe_scf<S, E, P>(scf: S, pol_embed: PolEmbed<E, P>) -> PolEmbedScf<S, E, P>
where
    S: SCF,
    E: MultipoleIntegralEngine,
    P: EmbeddingState,
{
    let name = format!("{} with PE", scf.name());
    PolEmbedScf {
        scf,
        pol_embed,
        name,
        lock: IterationLock::Unlocked,
        pe_energy: 0.0,
    }
}

impl<S, E, P> PolEmbedScf<S, E, P>
where
    S: SCF,
    E: MultipoleIntegralEngine,
    P: EmbeddingState,
{
    pub fn inner(&self) -> &S {
        &self.scf
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.scf
    }

    pub fn into_inner(self) -> S {
        self.scf
    }

    pub fn pol_embed(&self) -> &PolEmbed<E, P> {
        &self.pol_embed
    }

    pub fn pol_embed_mut(&mut self) -> &mut PolEmbed<E, P> {
        &mut self.pol_embed
    }

    pub fn lock(&self) -> IterationLock {
        self.lock
    }

    /// Embedding energy of the last evaluation.
    pub fn pe_energy(&self) -> f64 {
        self.pe_energy
    }
}

impl<S, E, P> SCF for PolEmbedScf<S, E, P>
where
    S: SCF,
    E: MultipoleIntegralEngine,
    P: EmbeddingState,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &ScfState {
        self.scf.state()
    }

    fn state_mut(&mut self) -> &mut ScfState {
        self.scf.state_mut()
    }

    fn get_hcore(&self) -> DMatrix<f64> {
        self.scf.get_hcore()
    }

    fn get_ovlp(&self) -> DMatrix<f64> {
        self.scf.get_ovlp()
    }

    fn energy_nuc(&self) -> f64 {
        self.scf.energy_nuc()
    }

    fn get_veff(&mut self, density: Density<'_>) -> Result<Veff> {
        let mut veff = self.scf.get_veff(density)?;
        match self.lock {
            IterationLock::Unlocked => {
                let (energy, potential) = self.pol_embed.kernel(density, false)?;
                veff.matrix += &potential;
                veff.embedding = Some(EmbeddingContribution { energy, potential });
                self.pe_energy = energy;
                self.lock = IterationLock::Locked;
            }
            IterationLock::Locked => {
                veff.embedding = None;
            }
        }
        Ok(veff)
    }

    fn energy_elec(
        &mut self,
        density: Density<'_>,
        h_core: &DMatrix<f64>,
        veff: &Veff,
    ) -> Result<(f64, f64)> {
        let fresh;
        let veff = if veff.is_tagged() {
            veff
        } else {
            self.lock = IterationLock::Unlocked;
            fresh = self.get_veff(density)?;
            &fresh
        };
        let contribution = veff.embedding.as_ref().ok_or_else(|| {
            ScfError::DimensionMismatch("effective potential lacks the embedding tag".to_string())
        })?;

        let host_veff = Veff::new(&veff.matrix - &contribution.potential);
        let result = self.scf.energy_elec(density, h_core, &host_veff);
        self.lock = IterationLock::Unlocked;

        let (e_tot, e_coul) = result?;
        info!("  PE Energy = {:.15}", contribution.energy);
        Ok((e_tot + contribution.energy, e_coul))
    }

    fn make_rdm1(&self, mo_coeff: &DMatrix<f64>) -> DMatrix<f64> {
        self.scf.make_rdm1(mo_coeff)
    }

    fn dump_flags(&self) -> Result<()> {
        self.scf.dump_flags()?;
        self.pol_embed.check_sanity()?;
        self.pol_embed.dump_flags();
        Ok(())
    }

    fn nuc_grad(&mut self) -> Result<Vec<Vector3<f64>>> {
        Err(ScfError::Unimplemented(
            "Nuclear gradients not implemented for PE.".to_string(),
        ))
    }

    fn eig(
        &self,
        fock: &DMatrix<f64>,
        overlap: &DMatrix<f64>,
    ) -> (nalgebra::DVector<f64>, DMatrix<f64>) {
        self.scf.eig(fock, overlap)
    }
}
