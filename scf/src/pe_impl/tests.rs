//! Tests for the embedding kernel and the SCF wrapper

use super::integrals::{field_at_site, field_operator, multipole_integrals};
use super::multipole::{Multipole, Potential};
use super::options::{MultipoleConfig, PolarizabilityConfig, SiteConfig};
use super::*;
use crate::error::{Result, ScfError};
use crate::scf_impl::{Density, ScfState, Veff, SCF};
use basis::basis::Basis;
use basis::gto::GTO;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use std::cell::Cell;
use std::sync::Arc;

// === Mocks ===

/// Two AOs with integrals that depend on the site in an easily traced way.
#[derive(Default)]
struct MockEngine {
    rinv_calls: Cell<usize>,
    iprinv_calls: Cell<usize>,
}

impl MultipoleIntegralEngine for MockEngine {
    fn nao(&self) -> usize {
        2
    }

    fn int1e_rinv(&self, origin: &Vector3<f64>) -> Result<DMatrix<f64>> {
        self.rinv_calls.set(self.rinv_calls.get() + 1);
        let r = 1.0 / (1.0 + origin.norm());
        Ok(DMatrix::from_row_slice(2, 2, &[r, 0.1 * r, 0.1 * r, 0.5 * r]))
    }

    fn int1e_iprinv(&self, origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>> {
        self.iprinv_calls.set(self.iprinv_calls.get() + 1);
        Ok((0..3)
            .map(|c| {
                DMatrix::from_row_slice(
                    2,
                    2,
                    &[0.1 * origin[c], 0.02 * (c + 1) as f64, 0.01, 0.03 + 0.05 * origin[c]],
                )
            })
            .collect())
    }

    fn int1e_ipiprinv(&self, _origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>> {
        Ok((0..9)
            .map(|c| DMatrix::from_row_slice(2, 2, &[0.01 * c as f64, 0.02, -0.01, 0.005 * c as f64]))
            .collect())
    }

    fn int1e_iprinvip(&self, _origin: &Vector3<f64>) -> Result<Vec<DMatrix<f64>>> {
        Ok((0..9)
            .map(|c| DMatrix::from_row_slice(2, 2, &[0.003 * c as f64, 0.01 * c as f64, 0.0, 0.001]))
            .collect())
    }
}

/// Answers every field with fixed dipoles and records what it was asked.
struct MockState {
    potentials: Vec<Potential>,
    moments: DVector<f64>,
    energies: Energies,
    updates: usize,
    last_fields: Option<DVector<f64>>,
    wrong_length: bool,
    sane: bool,
    sanity_checks: Cell<usize>,
}

impl MockState {
    fn new(potentials: Vec<Potential>) -> Self {
        let n = potentials.iter().filter(|p| p.is_polarizable()).count();
        MockState {
            potentials,
            moments: DVector::from_element(3 * n, 0.1),
            energies: Energies::default(),
            updates: 0,
            last_fields: None,
            wrong_length: false,
            sane: true,
            sanity_checks: Cell::new(0),
        }
    }
}

impl EmbeddingState for MockState {
    fn calculate_static_energies_and_fields(&mut self) -> Result<()> {
        self.energies.electrostatic.nuclear = 0.25;
        Ok(())
    }

    fn potentials(&self) -> &[Potential] {
        &self.potentials
    }

    fn update_induced_moments(&mut self, elec_fields: &DVector<f64>, _elec_only: bool) -> Result<()> {
        self.updates += 1;
        self.energies.polarization.electronic = -0.5 * self.moments.dot(elec_fields);
        self.last_fields = Some(elec_fields.clone());
        Ok(())
    }

    fn induced_moments(&self) -> DVector<f64> {
        if self.wrong_length {
            DVector::zeros(self.moments.len() + 1)
        } else {
            self.moments.clone()
        }
    }

    fn energies(&self) -> &Energies {
        &self.energies
    }

    fn energies_mut(&mut self) -> &mut Energies {
        &mut self.energies
    }

    fn check_sanity(&self) -> Result<()> {
        self.sanity_checks.set(self.sanity_checks.get() + 1);
        if self.sane {
            Ok(())
        } else {
            Err(ScfError::InvalidConfiguration("mock is not sane".to_string()))
        }
    }

    fn dump_flags(&self) {}
}

/// Host returning a constant potential; remembers the potential it was asked to price.
struct MockScf {
    state: ScfState,
    veff_calls: usize,
    energy_calls: usize,
    priced_veff: Option<DMatrix<f64>>,
}

impl MockScf {
    fn new() -> Self {
        MockScf {
            state: ScfState::default(),
            veff_calls: 0,
            energy_calls: 0,
            priced_veff: None,
        }
    }
}

impl SCF for MockScf {
    fn name(&self) -> &str {
        "MOCK"
    }

    fn state(&self) -> &ScfState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ScfState {
        &mut self.state
    }

    fn get_hcore(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[-1.0, -0.2, -0.2, -0.5])
    }

    fn get_ovlp(&self) -> DMatrix<f64> {
        DMatrix::identity(2, 2)
    }

    fn energy_nuc(&self) -> f64 {
        0.5
    }

    fn get_veff(&mut self, _density: Density<'_>) -> Result<Veff> {
        self.veff_calls += 1;
        Ok(Veff::new(DMatrix::from_element(2, 2, 0.1)))
    }

    fn energy_elec(
        &mut self,
        density: Density<'_>,
        h_core: &DMatrix<f64>,
        veff: &Veff,
    ) -> Result<(f64, f64)> {
        self.energy_calls += 1;
        self.priced_veff = Some(veff.matrix.clone());
        let p = density.total();
        let e_coul = 0.5 * p.dot(&veff.matrix);
        Ok((p.dot(h_core) + e_coul, e_coul))
    }

    fn make_rdm1(&self, mo_coeff: &DMatrix<f64>) -> DMatrix<f64> {
        let occ = mo_coeff.columns(0, 1);
        2.0 * &occ * occ.transpose()
    }

    fn dump_flags(&self) -> Result<()> {
        Ok(())
    }
}

// === Helpers ===

fn potential(index: usize, position: [f64; 3], charge: Option<f64>, alpha: Option<f64>) -> Potential {
    Potential {
        index,
        label: None,
        position: Vector3::from(position),
        multipoles: charge
            .map(|q| vec![Multipole { k: 0, values: vec![q] }])
            .unwrap_or_default(),
        polarizability: alpha.map(|a| Matrix3::identity() * a),
        exclusions: vec![],
    }
}

fn site(position: [f64; 3], multipoles: Vec<(usize, Vec<f64>)>, alpha: Option<f64>) -> SiteConfig {
    SiteConfig {
        label: None,
        position,
        multipoles: multipoles
            .into_iter()
            .map(|(order, values)| MultipoleConfig { order, values })
            .collect(),
        polarizability: alpha.map(PolarizabilityConfig::Isotropic),
        exclusions: vec![],
    }
}

fn options(potentials: Vec<SiteConfig>) -> PeOptions {
    PeOptions {
        induced_thresh: 1e-12,
        potentials,
        ..PeOptions::default()
    }
}

fn density() -> DMatrix<f64> {
    DMatrix::from_row_slice(2, 2, &[1.2, 0.3, 0.3, 0.8])
}

fn s_and_p_basis() -> AoIntegrals<GTO> {
    AoIntegrals::new(vec![
        Arc::new(GTO::new(0.9, Vector3::new(0, 0, 0), Vector3::new(0.0, 0.0, 0.0))),
        Arc::new(GTO::new(0.6, Vector3::new(0, 0, 1), Vector3::new(0.0, 0.3, 0.8))),
    ])
}

fn mock_pe(potentials: Vec<Potential>) -> PolEmbed<MockEngine, MockState> {
    let mut state = MockState::new(potentials);
    state.calculate_static_energies_and_fields().unwrap();
    PolEmbed::with_state(MockEngine::default(), state)
}

// === Multipole integrals ===

#[test]
fn test_order_above_two_is_unsupported() {
    let engine = MockEngine::default();
    assert!(matches!(
        multipole_integrals(&engine, &Vector3::zeros(), 3),
        Err(ScfError::UnsupportedOrder { order: 3 })
    ));

    let octupole = (3, vec![0.1; 10]);
    let opts = options(vec![site([0.0, 0.0, 4.0], vec![(0, vec![0.2]), octupole], None)]);
    let mut pe = PolEmbed::new(MockEngine::default(), vec![], opts).unwrap();
    assert!(matches!(
        pe.kernel(Density::Restricted(&density()), false),
        Err(ScfError::UnsupportedOrder { order: 3 })
    ));
}

#[test]
fn test_quadrupole_components_are_folded() {
    let engine = MockEngine::default();
    let ints = multipole_integrals(&engine, &Vector3::zeros(), 2).unwrap();
    assert_eq!(ints.len(), 6);

    let ipip = engine.int1e_ipiprinv(&Vector3::zeros()).unwrap();
    let iprip = engine.int1e_iprinvip(&Vector3::zeros()).unwrap();
    let raw = |c: usize| &ipip[c] + ipip[c].transpose() + &iprip[c] * 2.0;
    assert_eq!(ints[0], raw(0));
    assert!((&ints[1] - (raw(1) + raw(3)) * 0.5).norm() < 1e-15);
    assert!((&ints[4] - (raw(5) + raw(7)) * 0.5).norm() < 1e-15);
    assert_eq!(ints[5], raw(8));
}

#[test]
fn test_site_derivative_integrals_match_finite_differences() {
    let engine = s_and_p_basis();
    let c = Vector3::new(0.4, -0.2, 2.1);
    let h = 1e-4;
    let dx = Vector3::new(h, 0.0, 0.0);
    let dz = Vector3::new(0.0, 0.0, h);

    let first = multipole_integrals(&engine, &c, 1).unwrap();
    let fd_z = (engine.int1e_rinv(&(c + dz)).unwrap() - engine.int1e_rinv(&(c - dz)).unwrap())
        / (2.0 * h);
    assert!((&first[2] - fd_z).norm() < 1e-6);

    // second derivatives from the analytic first ones
    let second = multipole_integrals(&engine, &c, 2).unwrap();
    let grad_x = |site: Vector3<f64>| multipole_integrals(&engine, &site, 1).unwrap().swap_remove(0);
    let fd_xx = (grad_x(c + dx) - grad_x(c - dx)) / (2.0 * h);
    let fd_xz = (grad_x(c + dz) - grad_x(c - dz)) / (2.0 * h);
    assert!((&second[0] - fd_xx).norm() < 1e-5);
    assert!((&second[2] - fd_xz).norm() < 1e-5);

    for m in &second {
        assert!((m - m.transpose()).norm() < 1e-12);
    }
}

#[test]
fn test_field_operator_contracts_moment() {
    let engine = MockEngine::default();
    let c = Vector3::new(0.0, 1.0, 2.0);
    let mu = Vector3::new(0.5, -1.0, 2.0);
    let ints = multipole_integrals(&engine, &c, 1).unwrap();
    let expected = -(&ints[0] * 0.5 - &ints[1] + &ints[2] * 2.0);
    assert!((field_operator(&engine, &c, &mu).unwrap() - expected).norm() < 1e-14);

    let d = density();
    let field = field_at_site(&engine, &c, &d).unwrap();
    assert_eq!(field.z, d.dot(&ints[2]));
}

// === Kernel ===

#[test]
fn test_point_charge_energy() {
    let engine = s_and_p_basis();
    let a = GTO::new(0.9, Vector3::new(0, 0, 0), Vector3::zeros());
    let q = 0.5;
    let c = Vector3::new(0.0, 0.0, 2.0);

    let opts = options(vec![site([0.0, 0.0, 2.0], vec![(0, vec![q])], None)]);
    let mut pe = PolEmbed::new(engine, vec![], opts).unwrap();
    let d = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
    let (energy, v) = pe.kernel(Density::Restricted(&d), false).unwrap();

    // electrons are attracted by a positive charge
    let expected = -q * GTO::Rinvab(&a, &a, c);
    assert!(expected < 0.0);
    assert!((energy - expected).abs() < 1e-12);
    assert!((v[(0, 0)] - expected).abs() < 1e-12);
    assert_eq!(
        pe.state().energies().electrostatic.electronic,
        energy
    );
}

#[test]
fn test_charge_pair_matches_point_dipole() {
    let center = [0.3, -0.4, 2.5];
    let delta = 1e-3;
    let q = 1.0;
    let shifted = |dz: f64| [center[0], center[1], center[2] + dz];

    let pair = options(vec![
        site(shifted(delta), vec![(0, vec![q])], None),
        site(shifted(-delta), vec![(0, vec![-q])], None),
    ]);
    let dipole = options(vec![site(center, vec![(1, vec![0.0, 0.0, 2.0 * delta * q])], None)]);

    let mut pe_pair = PolEmbed::new(s_and_p_basis(), vec![], pair).unwrap();
    let mut pe_dipole = PolEmbed::new(s_and_p_basis(), vec![], dipole).unwrap();
    let v_pair = pe_pair.electrostatic_operator().unwrap().clone();
    let v_dipole = pe_dipole.electrostatic_operator().unwrap().clone();

    assert!(v_dipole.norm() > 1e-5);
    assert!((&v_pair - &v_dipole).norm() < 1e-8);
}

#[test]
fn test_site_on_nucleus_is_rejected() {
    let opts = options(vec![site([0.0, 0.0, 0.0], vec![(0, vec![0.5])], None)]);
    let atoms = vec![Atom {
        charge: 1.0,
        position: Vector3::zeros(),
    }];
    assert!(matches!(
        PolEmbed::new(MockEngine::default(), atoms, opts),
        Err(ScfError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_static_operator_is_cached() {
    let opts = options(vec![
        site([0.0, 0.0, 3.0], vec![(0, vec![-0.4]), (1, vec![0.0, 0.1, 0.2])], None),
        site([1.0, 0.0, -3.0], vec![(2, vec![0.3, 0.0, 0.1, -0.2, 0.0, 0.4])], None),
    ]);
    let mut pe = PolEmbed::new(MockEngine::default(), vec![], opts).unwrap();

    let d1 = density();
    let d2 = DMatrix::from_row_slice(2, 2, &[0.2, -0.1, -0.1, 1.9]);
    let (e1, v1) = pe.kernel(Density::Restricted(&d1), false).unwrap();
    let (e2, v2) = pe.kernel(Density::Restricted(&d2), false).unwrap();

    assert_eq!(v1, v2);
    assert_ne!(e1, e2);
    assert_eq!(pe.engine().rinv_calls.get(), 1);
    assert!((e2 - v2.dot(&d2) - pe.state().energies().electrostatic.multipoles).abs() < 1e-12);
}

#[test]
fn test_no_polarizable_sites_skips_solver() {
    let mut pe = mock_pe(vec![potential(0, [0.0, 0.0, 3.0], Some(1.0), None)]);
    let d = density();
    let v_ind = pe.induction_operator(&d, false).unwrap();
    assert_eq!(v_ind, DMatrix::zeros(2, 2));

    let (energy, v) = pe.kernel(Density::Restricted(&d), false).unwrap();
    assert_eq!(pe.state().updates, 0);
    assert_eq!(pe.engine().iprinv_calls.get(), 0);
    assert_eq!(&v, pe.electrostatic_operator().unwrap());
    assert!((energy - (0.25 + v.dot(&d))).abs() < 1e-14);
}

#[test]
fn test_induced_dipole_follows_field() {
    let alpha = 2.0;
    let opts = options(vec![site([0.0, 0.5, 3.0], vec![], Some(alpha))]);
    let mut pe = PolEmbed::new(MockEngine::default(), vec![], opts).unwrap();
    let d = density();

    let (e1, v1) = pe.kernel(Density::Restricted(&d), false).unwrap();
    let field = field_at_site(pe.engine(), &Vector3::new(0.0, 0.5, 3.0), &d).unwrap();
    let mu = pe.state().induced_moments();
    assert!((mu - DVector::from_column_slice((field * alpha).as_slice())).norm() < 1e-12);
    assert!((e1 + 0.5 * alpha * field.norm_squared()).abs() < 1e-12);

    let (e2, v2) = pe.kernel(Density::Restricted(&d), false).unwrap();
    assert!((e1 - e2).abs() < 1e-14);
    assert!((v1 - v2).norm() < 1e-14);
}

#[test]
fn test_elec_only_returns_electronic_polarization() {
    let alpha = 1.5;
    let position = Vector3::new(0.0, 0.0, 3.0);
    let opts = options(vec![
        site([0.0, 0.0, 3.0], vec![], Some(alpha)),
        site([2.0, 0.0, 5.0], vec![(0, vec![0.3])], None),
    ]);
    let atoms = vec![Atom {
        charge: 1.0,
        position: Vector3::zeros(),
    }];
    let mut pe = PolEmbed::new(MockEngine::default(), atoms, opts).unwrap();
    let d = density();

    let (energy, v) = pe.kernel(Density::Restricted(&d), true).unwrap();
    let field = field_at_site(pe.engine(), &position, &d).unwrap();
    let mu = field * alpha;

    assert!((energy + 0.5 * mu.dot(&field)).abs() < 1e-12);
    assert_eq!(energy, pe.state().energies().polarization.electronic);
    assert!((v - field_operator(pe.engine(), &position, &mu).unwrap()).norm() < 1e-12);
}

#[test]
fn test_unrestricted_density_is_summed() {
    let opts = options(vec![site([0.0, 0.0, 3.0], vec![(0, vec![0.5])], Some(1.0))]);
    let mut restricted = PolEmbed::new(MockEngine::default(), vec![], opts.clone()).unwrap();
    let mut unrestricted = PolEmbed::new(MockEngine::default(), vec![], opts).unwrap();

    let alpha = DMatrix::from_row_slice(2, 2, &[0.6, 0.1, 0.1, 0.4]);
    let beta = DMatrix::from_row_slice(2, 2, &[0.5, 0.2, 0.2, 0.3]);
    let total = &alpha + &beta;

    let (e_r, v_r) = restricted.kernel(Density::Restricted(&total), false).unwrap();
    let (e_u, v_u) = unrestricted
        .kernel(
            Density::Unrestricted {
                alpha: &alpha,
                beta: &beta,
            },
            false,
        )
        .unwrap();
    assert!((e_r - e_u).abs() < 1e-14);
    assert!((v_r - v_u).norm() < 1e-14);
}

#[test]
fn test_mixed_sites_keep_their_slots() {
    let mut a = site([0.0, 0.0, 3.0], vec![], Some(1.0));
    a.exclusions = vec![2];
    let b = site([0.0, 4.0, 0.0], vec![(0, vec![-0.8])], None);
    let c = site([3.0, 0.0, 0.0], vec![], Some(2.5));
    let mut pe = PolEmbed::new(MockEngine::default(), vec![], options(vec![a, b, c])).unwrap();
    assert_eq!(pe.state().polarizable_site_indices(), vec![0, 2]);

    let d = density();
    pe.kernel(Density::Restricted(&d), true).unwrap();
    let mu = pe.state().induced_moments();
    let f_a = field_at_site(pe.engine(), &Vector3::new(0.0, 0.0, 3.0), &d).unwrap();
    let f_c = field_at_site(pe.engine(), &Vector3::new(3.0, 0.0, 0.0), &d).unwrap();

    let mu_a: Vector3<f64> = mu.fixed_rows::<3>(0).into_owned();
    let mu_c: Vector3<f64> = mu.fixed_rows::<3>(3).into_owned();
    assert!((mu_a - f_a).norm() < 1e-12);
    assert!((mu_c - f_c * 2.5).norm() < 1e-12);
}

#[test]
fn test_fields_follow_polarizable_site_order() {
    let mut pe = mock_pe(vec![
        potential(0, [0.0, 0.0, 1.0], None, Some(1.0)),
        potential(1, [0.0, 0.0, 2.0], Some(1.0), None),
        potential(2, [0.0, 0.0, 3.0], None, Some(1.0)),
    ]);
    let d = density();
    pe.kernel(Density::Restricted(&d), false).unwrap();

    let fields = pe.state().last_fields.clone().unwrap();
    assert_eq!(fields.len(), 6);
    let f_third = field_at_site(pe.engine(), &Vector3::new(0.0, 0.0, 3.0), &d).unwrap();
    assert_eq!(fields[5], f_third.z);
}

#[test]
fn test_moment_length_is_checked() {
    let mut pe = mock_pe(vec![potential(0, [0.0, 0.0, 2.0], None, Some(1.0))]);
    pe.state_mut().wrong_length = true;
    assert!(matches!(
        pe.kernel(Density::Restricted(&density()), false),
        Err(ScfError::DimensionMismatch(_))
    ));
}

#[test]
fn test_density_size_is_checked() {
    let mut pe = mock_pe(vec![potential(0, [0.0, 0.0, 2.0], Some(1.0), None)]);
    let d = DMatrix::identity(3, 3);
    assert!(matches!(
        pe.kernel(Density::Restricted(&d), false),
        Err(ScfError::DimensionMismatch(_))
    ));
}

// === SCF wrapper ===

#[test]
fn test_potential_evaluated_once_per_iteration() {
    let pe = mock_pe(vec![potential(0, [0.0, 0.0, 2.0], Some(0.5), Some(1.0))]);
    let mut scf = pe_scf(MockScf::new(), pe);
    assert_eq!(scf.name(), "MOCK with PE");
    assert_eq!(scf.lock(), IterationLock::Unlocked);

    let d = density();
    let host = DMatrix::from_element(2, 2, 0.1);
    let first = scf.get_veff(Density::Restricted(&d)).unwrap();
    assert!(first.is_tagged());
    assert_eq!(scf.lock(), IterationLock::Locked);
    let contribution = first.embedding.clone().unwrap();
    assert!((&first.matrix - (&host + &contribution.potential)).norm() < 1e-14);
    assert_eq!(scf.pe_energy(), contribution.energy);

    let second = scf.get_veff(Density::Restricted(&d)).unwrap();
    assert!(!second.is_tagged());
    assert_eq!(second.matrix, host);
    assert_eq!(scf.pol_embed().state().updates, 1);

    let h = scf.get_hcore();
    let (e_elec, _) = scf.energy_elec(Density::Restricted(&d), &h, &first).unwrap();
    assert_eq!(scf.lock(), IterationLock::Unlocked);
    assert_eq!(scf.pol_embed().state().updates, 1);

    // host priced its own potential, embedding energy added on top
    let inner = scf.inner();
    assert!((inner.priced_veff.clone().unwrap() - &host).norm() < 1e-14);
    let host_energy = d.dot(&h) + 0.5 * d.dot(&host);
    assert!((e_elec - (host_energy + contribution.energy)).abs() < 1e-12);
}

#[test]
fn test_untagged_potential_forces_fresh_evaluation() {
    let pe = mock_pe(vec![potential(0, [0.0, 0.0, 2.0], Some(0.5), Some(1.0))]);
    let mut scf = pe_scf(MockScf::new(), pe);
    let d = density();
    let h = scf.get_hcore();

    scf.get_veff(Density::Restricted(&d)).unwrap();
    let stale = scf.get_veff(Density::Restricted(&d)).unwrap();
    assert!(!stale.is_tagged());

    let (e_elec, _) = scf.energy_elec(Density::Restricted(&d), &h, &stale).unwrap();
    assert_eq!(scf.pol_embed().state().updates, 2);
    assert_eq!(scf.inner().veff_calls, 3);
    assert_eq!(scf.lock(), IterationLock::Unlocked);

    let host = DMatrix::from_element(2, 2, 0.1);
    let host_energy = d.dot(&h) + 0.5 * d.dot(&host);
    assert!((e_elec - (host_energy + scf.pe_energy())).abs() < 1e-12);
}

#[test]
fn test_energy_tot_includes_embedding() {
    let pe = mock_pe(vec![potential(0, [0.0, 0.0, 2.0], Some(0.5), None)]);
    let mut scf = pe_scf(MockScf::new(), pe);
    let d = density();
    let h = scf.get_hcore();

    let veff = scf.get_veff(Density::Restricted(&d)).unwrap();
    let e_tot = scf.energy_tot(Density::Restricted(&d), &h, &veff).unwrap();
    let e_pe = veff.embedding.unwrap().energy;
    let host = DMatrix::from_element(2, 2, 0.1);
    assert!((e_tot - (d.dot(&h) + 0.5 * d.dot(&host) + e_pe + 0.5)).abs() < 1e-12);
}

#[test]
fn test_nuclear_gradients_unimplemented() {
    let pe = mock_pe(vec![]);
    let mut scf = pe_scf(MockScf::new(), pe);
    match scf.nuc_grad() {
        Err(ScfError::Unimplemented(msg)) => {
            assert_eq!(msg, "Nuclear gradients not implemented for PE.")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_dump_flags_checks_sanity() {
    let pe = mock_pe(vec![potential(0, [0.0, 0.0, 2.0], Some(0.5), None)]);
    let mut scf = pe_scf(MockScf::new(), pe);
    scf.dump_flags().unwrap();
    assert_eq!(scf.pol_embed().state().sanity_checks.get(), 1);

    scf.pol_embed_mut().state_mut().sane = false;
    assert!(matches!(
        scf.dump_flags(),
        Err(ScfError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_wrapper_shares_host_state() {
    let pe = mock_pe(vec![]);
    let mut scf = pe_scf(MockScf::new(), pe);
    scf.state_mut().max_cycle = 7;
    assert_eq!(scf.inner().state().max_cycle, 7);
    let host = scf.into_inner();
    assert_eq!(host.state.max_cycle, 7);
}

#[test]
fn test_wrapped_scf_cycle_converges() {
    let pe = mock_pe(vec![potential(0, [0.0, 0.0, 2.0], Some(0.5), Some(1.0))]);
    let mut scf = pe_scf(MockScf::new(), pe);
    let e_tot = scf.scf_cycle().unwrap();

    assert!(scf.state().converged);
    assert_eq!(scf.state().e_tot, e_tot);
    assert_eq!(scf.lock(), IterationLock::Unlocked);
    // one embedding solve per get_veff/energy_tot pair
    assert_eq!(scf.pol_embed().state().updates, scf.inner().energy_calls);
}
