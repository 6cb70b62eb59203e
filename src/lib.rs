//! Monte Carlo simulation of the 2D Ising model (Metropolis and Wolff
//! updates) and integrated autocorrelation time estimation of the recorded
//! series.

pub mod lattice;
pub mod energy;
pub mod metropolis;
pub mod wolff;
pub mod autocorrelation;
pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod io;
pub mod utils;

pub use error::{Degeneracy, ErrorKind, SimError};
