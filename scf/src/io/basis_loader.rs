//! Basis set loading utilities

use basis::cgto::Basis631G;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const LOCAL_BASIS_DIR: &str = "tests/basis_sets";

/// Fetch a basis set by name from the local library or the Basis Set Exchange
pub fn fetch_basis(atomic_symbol: &str, basis_name: &str) -> Result<Basis631G> {
    let name = basis_name.to_lowercase();
    let local_path = format!(
        "{}/{}.{}.nwchem",
        LOCAL_BASIS_DIR,
        name,
        atomic_symbol.to_lowercase()
    );
    if Path::new(&local_path).exists() {
        info!("Loading {} basis for {} from {}", name, atomic_symbol, local_path);
        let basis_str = fs::read_to_string(&local_path)
            .wrap_err_with(|| format!("Failed to read local basis set file: {}", local_path))?;
        return Basis631G::parse_nwchem(&basis_str)
            .wrap_err_with(|| format!("Failed to parse basis set file: {}", local_path));
    }

    let url = format!(
        "https://www.basissetexchange.org/api/basis/{}/format/nwchem?elements={}",
        name, atomic_symbol
    );
    info!("Fetching {} basis for {} from the Basis Set Exchange", name, atomic_symbol);
    debug!("URL: {}", url);
    let response = reqwest::blocking::get(&url)
        .and_then(|r| r.error_for_status())
        .wrap_err_with(|| format!("Failed to fetch basis set for {}", atomic_symbol))?;
    let basis_str = response
        .text()
        .wrap_err("Failed to get response text from basis set API")?;
    debug!("Got {} bytes of basis set data", basis_str.len());
    Basis631G::parse_nwchem(&basis_str)
        .wrap_err_with(|| format!("Failed to parse {} basis for {}", name, atomic_symbol))
}
