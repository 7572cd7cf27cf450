//! Polarizable embedding (PE) for an SCF host
//!
//! [`PolEmbed`] turns a density into the embedding energy and potential, and
//! [`pe_scf`] wraps an existing solver so that every SCF iteration includes them.

pub mod integrals;
pub mod kernel;
pub mod multipole;
pub mod options;
pub mod shim;
pub mod state;

#[cfg(test)]
mod tests;

pub use integrals::{AoIntegrals, MultipoleIntegralEngine};
pub use kernel::PolEmbed;
pub use options::PeOptions;
pub use shim::{pe_scf, IterationLock, PolEmbedScf};
pub use state::{Atom, ClassicalEmbedding, EmbeddingState, Energies};
