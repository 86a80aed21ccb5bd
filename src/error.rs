use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    /// The collect or fill script could not run in the page context.
    #[error("Script evaluation failed: {0}")]
    ScriptEvaluationFailed(String),

    /// A fingerprint or selector resolved to zero elements.
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Unable to parse fill script JSON: {0}")]
    MalformedScript(#[source] serde_json::Error),

    #[error("Unsupported selector: {0}")]
    UnsupportedSelector(String),

    #[error("Page {page_url} is not protected but the login was saved on {saved_url}")]
    InsecurePage { saved_url: String, page_url: String },

    #[error("Fill cancelled before operation {0}")]
    Cancelled(usize),

    #[error("DOM snapshot failed: {0}")]
    Snapshot(String),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),
}

impl Error {
    /// Per-operation failures that the executor logs and skips instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::FieldNotFound(_) | Error::UnsupportedSelector(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
