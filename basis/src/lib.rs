//! Gaussian basis functions and the one- and two-electron integrals over them.

pub mod basis;
pub mod cgto;
pub mod gto;
pub mod helper;
