//! Configuration management for SCF calculations
//!
//! This module provides structures for parsing YAML configuration files
//! and command-line arguments, including the optional polarizable embedding block.

use crate::pe_impl::PeOptions;
use crate::scf_impl::ScfState;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Command-line arguments for SCF calculations
#[derive(Parser, Debug)]
#[command(name = "pe_scf")]
#[command(about = "Hartree-Fock with polarizable embedding", long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "scf/example/h2o_pe.yaml")]
    pub config_file: String,

    /// Output file path (optional)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Molecular charge (overrides config file)
    #[arg(long)]
    pub charge: Option<i32>,

    /// Density mixing factor (0.0 to 1.0, overrides config file)
    #[arg(long)]
    pub density_mixing: Option<f64>,

    /// Maximum number of SCF cycles (overrides config file)
    #[arg(long)]
    pub max_cycle: Option<usize>,

    /// Energy convergence threshold (overrides config file)
    #[arg(long)]
    pub convergence_threshold: Option<f64>,

    /// Run without the embedding even if the config file has one
    #[arg(long)]
    pub no_embedding: bool,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Molecular geometry
    pub geometry: Vec<AtomConfig>,

    /// Basis set name for each element, e.g. `H: "sto-3g"`
    #[serde(default)]
    pub basis_sets: HashMap<String, String>,

    /// SCF calculation parameters
    #[serde(default)]
    pub scf_params: ScfParams,

    /// Molecular charge (optional)
    #[serde(default)]
    pub charge: Option<i32>,

    /// Polarizable embedding environment (optional)
    #[serde(default)]
    pub embedding: Option<PeOptions>,
}

/// Atom configuration in the molecular geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomConfig {
    /// Element symbol (e.g., "H", "O", "C")
    pub element: String,

    /// Atomic coordinates [x, y, z] in bohr
    pub coords: [f64; 3],
}

/// SCF calculation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScfParams {
    /// Density mixing factor for simple mixing (0.0 to 1.0)
    /// Higher values give more weight to the new density
    #[serde(default)]
    pub density_mixing: Option<f64>,

    /// Maximum number of SCF cycles
    #[serde(default)]
    pub max_cycle: Option<usize>,

    /// Energy convergence threshold in Hartree
    #[serde(default)]
    pub convergence_threshold: Option<f64>,

    /// DIIS subspace size (number of Fock/error matrices to keep)
    /// Set to 0 to disable DIIS acceleration
    #[serde(default)]
    pub diis_subspace_size: Option<usize>,
}

impl Default for ScfParams {
    fn default() -> Self {
        let state = ScfState::default();
        ScfParams {
            density_mixing: Some(state.density_mixing),
            max_cycle: Some(state.max_cycle),
            convergence_threshold: Some(state.convergence_threshold),
            diis_subspace_size: Some(state.diis_subspace_size),
        }
    }
}

impl ScfParams {
    /// Apply default values to any missing fields
    pub fn with_defaults(mut self) -> Self {
        let defaults = ScfParams::default();
        self.density_mixing = self.density_mixing.or(defaults.density_mixing);
        self.max_cycle = self.max_cycle.or(defaults.max_cycle);
        self.convergence_threshold = self.convergence_threshold.or(defaults.convergence_threshold);
        self.diis_subspace_size = self.diis_subspace_size.or(defaults.diis_subspace_size);
        self
    }

    /// Copies the parameters that are set into an SCF state.
    pub fn apply(&self, state: &mut ScfState) {
        if let Some(mixing) = self.density_mixing {
            state.density_mixing = mixing;
        }
        if let Some(max_cycle) = self.max_cycle {
            state.max_cycle = max_cycle;
        }
        if let Some(threshold) = self.convergence_threshold {
            state.convergence_threshold = threshold;
        }
        if let Some(size) = self.diis_subspace_size {
            state.diis_subspace_size = size;
        }
    }
}

impl Config {
    /// Apply default values to any missing configuration fields
    pub fn with_defaults(mut self) -> Self {
        self.scf_params = self.scf_params.with_defaults();
        self
    }

    /// Command-line values take precedence over the file.
    pub fn merge_args(mut self, args: &Args) -> Self {
        if args.charge.is_some() {
            self.charge = args.charge;
        }
        if args.density_mixing.is_some() {
            self.scf_params.density_mixing = args.density_mixing;
        }
        if args.max_cycle.is_some() {
            self.scf_params.max_cycle = args.max_cycle;
        }
        if args.convergence_threshold.is_some() {
            self.scf_params.convergence_threshold = args.convergence_threshold;
        }
        if args.no_embedding {
            self.embedding = None;
        }
        self
    }

    /// Basis set name for an element, 6-31G unless configured otherwise.
    pub fn basis_name(&self, symbol: &str) -> &str {
        self.basis_sets
            .get(symbol)
            .map(String::as_str)
            .unwrap_or("6-31g")
    }
}
