use std::error::Error;
use std::fmt;

/// Errors surfaced by tree construction and frame stepping.
///
/// Zero-separation degeneracies during force evaluation are not represented
/// here: they are recoverable at single-contribution granularity and are
/// skipped with a debug log instead.
#[derive(Debug, Clone)]
pub enum SimError {
    /// A body could not be classified into any child rectangle during
    /// insertion. Only possible with malformed root bounds; construction
    /// aborts.
    OutsideRegion { name: String, x: f64, y: f64 },
    /// A body with non-positive mass reached the integrator.
    ZeroMass { name: String },
    /// A worker thread panicked during a parallel phase.
    WorkerPanic,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::OutsideRegion { name, x, y } => {
                write!(f, "body {name:?} at ({x}, {y}) fits no child region")
            }
            SimError::ZeroMass { name } => {
                write!(f, "body {name:?} has non-positive mass")
            }
            SimError::WorkerPanic => write!(f, "a worker thread panicked"),
        }
    }
}

impl Error for SimError {}
