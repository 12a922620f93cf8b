use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrepError>;

/// Failures raised while loading, vectorising or whitening a dataset.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Empty input, ragged rows, or a shape an operation cannot accept.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Two operands of a matrix operation do not line up.
    #[error("dimension mismatch in {step}: left is {left:?}, right is {right:?}")]
    DimensionMismatch {
        step: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("factorization failed in {step}: {reason}")]
    FactorizationFailed { step: &'static str, reason: String },

    #[error("bad magic number: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: i32, found: i32 },

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failure: {0}")]
    Image(#[from] image::ImageError),
}

impl PrepError {
    pub(crate) fn shape(msg: impl Into<String>) -> PrepError {
        PrepError::InvalidShape(msg.into())
    }
}
