use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("response body is not valid json: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Upstream and transport failures are expected operational noise;
    /// everything else points at a bug or misconfiguration.
    pub fn is_upstream_unavailable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Upstream { .. })
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
