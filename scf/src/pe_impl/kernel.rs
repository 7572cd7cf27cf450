use super::integrals::{field_at_site, field_operator, multipole_integrals, MultipoleIntegralEngine};
use super::multipole::{prefactors, Potential};
use super::options::PeOptions;
use super::state::{Atom, ClassicalEmbedding, EmbeddingState};
use crate::error::{Result, ScfError};
use crate::scf_impl::Density;
use nalgebra::{DMatrix, DVector, Vector3};
use tracing::{debug, info};

/// Polarizable embedding of a quantum region: builds the embedding potential and
/// energy for a given electron density.
pub struct PolEmbed<E, S = ClassicalEmbedding> {
    engine: E,
    state: S,
    v_es: Option<DMatrix<f64>>,
}

impl<E: MultipoleIntegralEngine> PolEmbed<E, ClassicalEmbedding> {
    /// Sets up the classical environment and its static energies and fields.
    ///
    /// Fails with `InvalidConfiguration` when the environment is not sane.
    pub fn new(engine: E, atoms: Vec<Atom>, options: PeOptions) -> Result<Self> {
        let printer = Box::new(|msg: &str| info!("{}", msg));
        let mut state = ClassicalEmbedding::new(options, atoms, printer)?;
        // coinciding sites or nuclei would leave infinite static terms behind
        state.check_sanity()?;
        state.calculate_static_energies_and_fields()?;
        Ok(Self::with_state(engine, state))
    }
}

impl<E: MultipoleIntegralEngine, S: EmbeddingState> PolEmbed<E, S> {
    pub fn with_state(engine: E, state: S) -> Self {
        PolEmbed {
            engine,
            state,
            v_es: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn potentials(&self) -> &[Potential] {
        self.state.potentials()
    }

    /// Static multipole operator `V_es`, built on first use and cached.
    pub fn electrostatic_operator(&mut self) -> Result<&DMatrix<f64>> {
        if self.v_es.is_none() {
            let n = self.engine.nao();
            let mut v_es = DMatrix::zeros(n, n);
            for site in self.state.potentials() {
                for m in &site.multipoles {
                    let weights = prefactors(m.k)?;
                    let ints = multipole_integrals(&self.engine, &site.position, m.k)?;
                    for ((int, w), value) in ints.iter().zip(&weights).zip(&m.values) {
                        v_es += int * (w * value);
                    }
                }
            }
            debug!("Built static multipole operator for {} sites", self.state.potentials().len());
            self.v_es = Some(v_es);
        }
        self.v_es
            .as_ref()
            .ok_or_else(|| ScfError::Integral("static multipole operator unavailable".to_string()))
    }

    fn polarizable_sites(&self) -> Result<Vec<(usize, Vector3<f64>)>> {
        let potentials = self.state.potentials();
        self.state
            .polarizable_site_indices()
            .into_iter()
            .map(|id| {
                potentials
                    .iter()
                    .find(|p| p.index == id)
                    .map(|p| (id, p.position))
                    .ok_or_else(|| {
                        ScfError::DimensionMismatch(format!("polarizable site {} not found", id))
                    })
            })
            .collect()
    }

    /// Operator of the induced dipoles for `density`; solves for the dipoles first.
    ///
    /// Without polarizable sites this is the zero matrix and the classical solver is
    /// not consulted.
    pub fn induction_operator(&mut self, density: &DMatrix<f64>, elec_only: bool) -> Result<DMatrix<f64>> {
        let n = self.engine.nao();
        let sites = self.polarizable_sites()?;
        if sites.is_empty() {
            return Ok(DMatrix::zeros(n, n));
        }

        let mut elec_fields = DVector::zeros(3 * sites.len());
        for (slot, (_, position)) in sites.iter().enumerate() {
            let field = field_at_site(&self.engine, position, density)?;
            elec_fields.fixed_rows_mut::<3>(3 * slot).copy_from(&field);
        }

        self.state.update_induced_moments(&elec_fields, elec_only)?;
        let moments = self.state.induced_moments();
        if moments.len() != elec_fields.len() {
            return Err(ScfError::DimensionMismatch(format!(
                "{} induced moment components for {} polarizable sites",
                moments.len(),
                sites.len()
            )));
        }

        let mut v_ind = DMatrix::zeros(n, n);
        for (slot, (_, position)) in sites.iter().enumerate() {
            let moment: Vector3<f64> = moments.fixed_rows::<3>(3 * slot).into_owned();
            v_ind += field_operator(&self.engine, position, &moment)?;
        }
        Ok(v_ind)
    }

    /// Embedding energy and potential for `density`.
    ///
    /// With `elec_only` only the electronic polarization energy and the induction
    /// operator are returned.
    pub fn kernel(&mut self, density: Density<'_>, elec_only: bool) -> Result<(f64, DMatrix<f64>)> {
        let n = self.engine.nao();
        if density.nao() != n {
            return Err(ScfError::DimensionMismatch(format!(
                "density has {} AOs, integral engine {}",
                density.nao(),
                n
            )));
        }
        let dm = density.total();

        let e_es = self.electrostatic_operator()?.dot(&dm);
        self.state.energies_mut().electrostatic.electronic = e_es;

        let v_ind = self.induction_operator(&dm, elec_only)?;

        if elec_only {
            Ok((self.state.energies().polarization.electronic, v_ind))
        } else {
            let energy = self.state.total_energy();
            let v_es = self.electrostatic_operator()?;
            Ok((energy, v_es + v_ind))
        }
    }

    pub fn check_sanity(&self) -> Result<()> {
        self.state.check_sanity()
    }

    pub fn dump_flags(&self) {
        info!("******** PolEmbed flags ********");
        info!("  nao = {}", self.engine.nao());
        self.state.dump_flags();
    }
}
