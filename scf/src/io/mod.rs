//! Input/Output operations for SCF calculations
//!
//! This module handles logging setup, result reports and basis set loading.

mod basis_loader;
mod output;

pub use basis_loader::fetch_basis;
pub use output::{print_embedding_summary, setup_output};
