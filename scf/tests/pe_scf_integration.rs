//! End-to-end runs of the embedded Hartree-Fock solver on H2

use basis::cgto::{Basis631G, ContractedGTO};
use nalgebra::Vector3;
use pe_scf::pe_impl::options::{MultipoleConfig, PolarizabilityConfig, SiteConfig};
use pe_scf::pe_impl::{
    pe_scf, AoIntegrals, Atom, EmbeddingState, PeOptions, PolEmbed, PolEmbedScf,
};
use pe_scf::scf_impl::{Density, SimpleSCF, SCF};
use periodic_table_on_an_enum::Element;
use std::collections::HashMap;
use std::fs;

const H2_STO3G_ENERGY: f64 = -1.1167143502770278;

fn h2_sto3g() -> SimpleSCF<Basis631G> {
    let basis_str = fs::read_to_string("tests/basis_sets/sto-3g.h.nwchem").unwrap();
    let h = Basis631G::parse_nwchem(&basis_str).unwrap();
    let mut basis_map = HashMap::new();
    basis_map.insert("H", &h);

    let mut scf = SimpleSCF::<Basis631G>::new();
    scf.init_basis(&[Element::Hydrogen, Element::Hydrogen], &basis_map)
        .unwrap();
    scf.init_geometry(&[Vector3::new(0.0, 0.0, -0.7), Vector3::new(0.0, 0.0, 0.7)])
        .unwrap();
    scf.state_mut().convergence_threshold = 1e-10;
    scf
}

fn site(position: [f64; 3], charge: f64, alpha: Option<f64>) -> SiteConfig {
    SiteConfig {
        label: None,
        position,
        multipoles: vec![MultipoleConfig {
            order: 0,
            values: vec![charge],
        }],
        polarizability: alpha.map(PolarizabilityConfig::Isotropic),
        exclusions: vec![],
    }
}

type EmbeddedH2 = PolEmbedScf<SimpleSCF<Basis631G>, AoIntegrals<ContractedGTO>>;

fn embed(scf: SimpleSCF<Basis631G>, options: PeOptions) -> EmbeddedH2 {
    let engine = AoIntegrals::new(scf.basis_functions().to_vec());
    let atoms = scf
        .nuclei()
        .into_iter()
        .map(|(charge, position)| Atom { charge, position })
        .collect();
    let pol_embed = PolEmbed::new(engine, atoms, options).unwrap();
    pe_scf(scf, pol_embed)
}

#[test]
fn test_bare_h2_reference() {
    let mut scf = h2_sto3g();
    let e = scf.scf_cycle().unwrap();
    assert!((e - H2_STO3G_ENERGY).abs() < 1e-6);
}

#[test]
fn test_empty_environment_reproduces_host() {
    let options = PeOptions {
        potentials: vec![site([0.0, 0.0, 6.0], 0.0, None)],
        ..PeOptions::default()
    };
    let mut pe = embed(h2_sto3g(), options);
    let e = pe.scf_cycle().unwrap();
    assert!((e - H2_STO3G_ENERGY).abs() < 1e-6);
    assert_eq!(pe.pe_energy(), 0.0);
}

#[test]
fn test_point_charge_and_polarizable_site() {
    let options = PeOptions {
        induced_thresh: 1e-12,
        potentials: vec![
            site([0.0, 0.0, 4.0], 0.5, None),
            site([0.0, 3.5, 0.0], -0.2, Some(2.0)),
        ],
        ..PeOptions::default()
    };
    let mut pe = embed(h2_sto3g(), options);
    let e = pe.scf_cycle().unwrap();

    assert!(pe.state().converged);
    assert!((e - H2_STO3G_ENERGY).abs() > 1e-4);
    assert_eq!(pe.pe_energy(), pe.pol_embed().state().total_energy());

    // total energy is the host energy of the final density plus the embedding energy
    let density = pe.state().density.clone();
    let pe_energy = pe.pe_energy();
    let host = pe.inner_mut();
    let h_core = host.get_hcore();
    let veff = host.get_veff(Density::Restricted(&density)).unwrap();
    let e_host = host
        .energy_tot(Density::Restricted(&density), &h_core, &veff)
        .unwrap();
    assert!((e - (e_host + pe_energy)).abs() < 1e-10);
}

#[test]
fn test_distant_charge_sees_a_neutral_molecule() {
    let options = PeOptions {
        potentials: vec![site([0.0, 0.0, 20.0], 0.5, None)],
        ..PeOptions::default()
    };
    let mut pe = embed(h2_sto3g(), options);
    pe.scf_cycle().unwrap();

    let es = pe.pol_embed().state().energies().electrostatic;
    assert!(es.nuclear > 0.04);
    assert!(es.electronic < -0.04);
    assert!((es.nuclear + es.electronic).abs() < 1e-3);
}

#[test]
fn test_side_charge_lowers_the_energy() {
    let options = PeOptions {
        potentials: vec![site([0.0, 4.0, 0.0], 0.5, None)],
        ..PeOptions::default()
    };
    let mut pe = embed(h2_sto3g(), options);
    let e = pe.scf_cycle().unwrap();
    assert!(e < H2_STO3G_ENERGY);
    assert!(e > H2_STO3G_ENERGY - 0.05);
}

#[test]
fn test_nuclear_gradients_rejected() {
    let options = PeOptions {
        potentials: vec![site([0.0, 0.0, 4.0], 0.5, None)],
        ..PeOptions::default()
    };
    let mut pe = embed(h2_sto3g(), options);
    let err = pe.nuc_grad().unwrap_err();
    assert_eq!(err.to_string(), "Nuclear gradients not implemented for PE.");
}
