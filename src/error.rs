use thiserror::Error;

/// Errors raised while turning a set of wires into a field-line plot.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("no wire sources were submitted")]
    NoSources,

    #[error("invalid wire: {0}")]
    InvalidSource(String),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("failed to draw plot: {0}")]
    Render(String),

    #[error("failed to encode png: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, FieldError>;
