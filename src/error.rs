use crate::sequence::Sequence;
use thiserror::Error;

/// Result type alias using [`NetworkError`].
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors raised while building elements or assembling sequence networks.
///
/// Configuration and topology errors are fatal and propagate to the caller
/// unchanged. Numeric degeneracies (zero branches in delta/star transforms)
/// are resolved by limiting rules and never show up here.
#[derive(Error, Debug)]
pub enum NetworkError {
    // Configuration errors
    #[error("unknown winding connection '{0}' (expected Yg, Yzn, Y, Yn or D)")]
    UnknownConnection(String),

    #[error("invalid per-unit base for bus {bus}: v_base={v_base}, s_base={s_base}")]
    InvalidBase { bus: usize, v_base: f64, s_base: f64 },

    #[error("elements {first} and {second} cannot be merged: terminals differ")]
    MismatchedTerminals { first: String, second: String },

    #[error("invalid terminals {terminals:?}: {reason}")]
    InvalidTerminals {
        terminals: Vec<usize>,
        reason: &'static str,
    },

    #[error("{element} expects {expected} terminal values, got {actual}")]
    TerminalCount {
        element: String,
        expected: usize,
        actual: usize,
    },

    // Topology errors
    #[error("primitive admittance matrix is singular at branch {row} ({sequence})")]
    SingularPrimitive { sequence: Sequence, row: usize },

    #[error("bus admittance matrix is singular ({sequence})")]
    SingularBusAdmittance { sequence: Sequence },

    #[error("bus {0} is not connected to the reference bus")]
    Disconnected(usize),

    #[error("unknown bus id {0}")]
    UnknownBus(usize),

    #[error("{stage} requested before {missing} for {sequence}")]
    StageOrder {
        sequence: Sequence,
        stage: &'static str,
        missing: &'static str,
    },

    #[error("matrix dimensions do not agree: {0}")]
    Dimension(String),

    // Variable errors
    #[error("{0} value has not been defined")]
    UndefinedValue(&'static str),
}
