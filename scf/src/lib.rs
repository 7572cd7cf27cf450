// Hartree-Fock host solver with a polarizable embedding correction

pub mod config;
pub mod error;
pub mod io;
pub mod pe_impl;
pub mod scf_impl;
