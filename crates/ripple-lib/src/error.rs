use thiserror::Error;

/// Errors raised by the detection core and its collaborators. Stages that
/// end with zero survivors report that as data.
#[derive(Error, Debug)]
pub enum RippleError {
    /// A parameter is malformed (even window, inverted thresholds, ...).
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in `RippleConfig`
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Normalization is undefined for the given signal.
    #[error("degenerate signal: {reason}")]
    DegenerateSignal {
        /// Description of the degeneracy
        reason: String,
    },

    /// A requested collaborator (noise channel, EMG estimate) produced nothing.
    #[error("missing collaborator data: {what}")]
    MissingCollaboratorData {
        /// Which input was unavailable
        what: String,
    },

    /// Two sequences that must be aligned have different lengths.
    #[error("{what}: length mismatch ({left} vs {right})")]
    LengthMismatch {
        /// The pair being compared
        what: &'static str,
        /// Length of the first sequence
        left: usize,
        /// Length of the second sequence
        right: usize,
    },

    /// The band filter could not run on the given input.
    #[error("filter failed: {0}")]
    Filter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Persist(#[from] serde_json::Error),
}

impl RippleError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RippleError>;
