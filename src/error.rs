use thiserror::Error;

/// Every failure a digest activity can surface.
///
/// Parsing problems (`InvalidFormat`, `InvalidArgument`) are raised before the
/// ledger is touched, so a rejected reference never reaches the store.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;

impl From<serde_json::Error> for DigestError {
    fn from(err: serde_json::Error) -> Self {
        DigestError::PersistenceFailure(format!("json error: {}", err))
    }
}

impl From<std::io::Error> for DigestError {
    fn from(err: std::io::Error) -> Self {
        DigestError::PersistenceFailure(err.to_string())
    }
}

impl From<handlebars::RenderError> for DigestError {
    fn from(err: handlebars::RenderError) -> Self {
        DigestError::Render(err.to_string())
    }
}

impl From<handlebars::TemplateError> for DigestError {
    fn from(err: handlebars::TemplateError) -> Self {
        DigestError::Render(err.to_string())
    }
}

impl DigestError {
    /// True for the two parse-boundary errors.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DigestError::InvalidFormat(_) | DigestError::InvalidArgument(_)
        )
    }
}
