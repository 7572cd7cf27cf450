//! SCF Calculation Command-Line Interface
//!
//! Runs a restricted Hartree-Fock calculation from a YAML configuration, with a
//! polarizable embedding when the configuration has an `embedding` block.

use basis::cgto::Basis631G;
use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use nalgebra::Vector3;
use pe_scf::config::{Args, Config};
use pe_scf::io::{fetch_basis, print_embedding_summary, setup_output};
use pe_scf::pe_impl::{
    pe_scf, AoIntegrals, Atom, EmbeddingState, Energies, PeOptions, PolEmbed,
};
use pe_scf::scf_impl::{SimpleSCF, SCF};
use periodic_table_on_an_enum::Element;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use tracing::info;

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_output(args.output.as_ref())?;

    info!("Reading configuration from: {}", args.config_file);
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;
    let config: Config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .merge_args(&args)
        .with_defaults();
    info!("Configuration loaded:\n{:?}", config);

    let (elements, coords) = prepare_geometry(&config)?;
    let basis_sets = prepare_basis_sets(&config, &elements)?;
    let basis_map: HashMap<&str, &Basis631G> =
        basis_sets.iter().map(|(k, v)| (k.as_str(), v)).collect();

    let mut scf = SimpleSCF::<Basis631G>::new();
    scf.set_charge(config.charge.unwrap_or(0));
    config.scf_params.apply(scf.state_mut());
    scf.init_basis(&elements, &basis_map)?;
    scf.init_geometry(&coords)?;

    let (e_tot, converged, energies) = match config.embedding.clone() {
        Some(options) => run_embedded(scf, options)?,
        None => {
            info!("\nStarting SCF cycle...\n");
            let e_tot = scf.scf_cycle()?;
            (e_tot, scf.state().converged, None)
        }
    };

    let mut stdout = std::io::stdout();
    print_embedding_summary(&mut stdout, e_tot, converged, energies.as_ref())?;
    if let Some(path) = &args.output {
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("Unable to append results to {}", path))?;
        print_embedding_summary(&mut file, e_tot, converged, energies.as_ref())?;
    }

    if !converged {
        return Err(eyre!("SCF did not converge"));
    }
    Ok(())
}

/// Wrap the host in the embedding and run it
fn run_embedded(
    scf: SimpleSCF<Basis631G>,
    options: PeOptions,
) -> Result<(f64, bool, Option<Energies>)> {
    let engine = AoIntegrals::new(scf.basis_functions().to_vec());
    let atoms = scf
        .nuclei()
        .into_iter()
        .map(|(charge, position)| Atom { charge, position })
        .collect();

    info!("\nSetting up polarizable embedding ({} sites)...", options.potentials.len());
    let pol_embed = PolEmbed::new(engine, atoms, options)?;
    let mut pe = pe_scf(scf, pol_embed);

    info!("\nStarting {} cycle...\n", pe.name());
    let e_tot = pe.scf_cycle()?;
    let energies = *pe.pol_embed().state().energies();
    info!("PE energy: {:.12} au", pe.pe_energy());
    Ok((e_tot, pe.state().converged, Some(energies)))
}

/// Prepare molecular geometry from configuration
fn prepare_geometry(config: &Config) -> Result<(Vec<Element>, Vec<Vector3<f64>>)> {
    info!("\nPreparing geometry...");
    config
        .geometry
        .iter()
        .map(|atom| {
            let element = Element::from_symbol(&atom.element)
                .ok_or_else(|| eyre!("Invalid element symbol: {}", atom.element))?;
            Ok((element, Vector3::from(atom.coords)))
        })
        .collect::<Result<Vec<_>>>()
        .map(|atoms| atoms.into_iter().unzip())
}

/// Load one basis set per distinct element
fn prepare_basis_sets(
    config: &Config,
    elements: &[Element],
) -> Result<HashMap<String, Basis631G>> {
    info!("\nPreparing basis sets...");
    let mut basis_sets = HashMap::new();
    for elem in elements {
        let symbol = elem.get_symbol();
        if basis_sets.contains_key(symbol) {
            continue;
        }
        let basis = fetch_basis(symbol, config.basis_name(symbol))?;
        basis_sets.insert(symbol.to_string(), basis);
    }
    Ok(basis_sets)
}
