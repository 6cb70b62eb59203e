//! Error kinds shared by the engines, the estimator and the coordinator.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Which numeric condition made an autocorrelation estimate meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Degeneracy {
    /// `<O²> - <O>²` was not strictly positive.
    ZeroVariance { variance: f64 },
    /// The first non-positive correlation appeared before two positive lags
    /// were available for the geometric tail.
    ShortHistory { lag: usize },
    /// `rho(t-1)/rho(t-2)` is within rounding of 1, so the geometric tail
    /// `1/(1-r)` blows up.
    FlatTail { lag: usize },
    /// The tail correction evaluated to a non-finite number.
    NonFiniteTail { lag: usize },
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degeneracy::ZeroVariance { variance } => {
                write!(f, "series variance {variance:e} is not positive")
            }
            Degeneracy::ShortHistory { lag } => write!(
                f,
                "non-positive correlation at lag {lag}, fewer than two prior lags to extrapolate"
            ),
            Degeneracy::FlatTail { lag } => write!(
                f,
                "tail ratio before lag {lag} is within rounding of 1, no finite extrapolation"
            ),
            Degeneracy::NonFiniteTail { lag } => {
                write!(f, "tail correction at lag {lag} is not finite")
            }
        }
    }
}

/// Coarse classification used in per-unit failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Configuration,
    NumericDegeneracy,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::NumericDegeneracy => "NumericDegeneracy",
            ErrorKind::Io => "IOFailure",
        };
        f.write_str(name)
    }
}

/// Canonical error type of the crate.
#[derive(Debug, Error)]
pub enum SimError {
    /// Rejected parameters; raised before any unit is dispatched.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The estimator could not produce a meaningful result.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(Degeneracy),
    /// Reading or writing a file failed. Never retried.
    #[error("i/o failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::Configuration(_) => ErrorKind::Configuration,
            SimError::NumericDegeneracy(_) => ErrorKind::NumericDegeneracy,
            SimError::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        SimError::Configuration(message.into())
    }

    /// Builds a `map_err` adapter that attaches `path` to any error convertible
    /// into `io::Error` (csv and serde_json errors both are).
    pub(crate) fn io_at<E>(path: &Path) -> impl FnOnce(E) -> SimError + '_
    where
        E: Into<io::Error>,
    {
        move |err| SimError::Io {
            path: path.to_path_buf(),
            source: err.into(),
        }
    }
}

impl From<Degeneracy> for SimError {
    fn from(value: Degeneracy) -> Self {
        SimError::NumericDegeneracy(value)
    }
}
