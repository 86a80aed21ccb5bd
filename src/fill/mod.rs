//! Fill executor: runs a fill script against a previously indexed document.

mod executor;
mod protocol;
mod script;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dom::Document;

pub use executor::{FillExecutor, FillReport, FillRun, RunState, Step};
pub use protocol::is_truthy;
pub use script::{Autosubmit, FillOptions, FillProperties, FillScript, Operation};

/// Result object handed back to the credential-selection surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FillResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Parse `payload` and run it with the default engine configuration.
///
/// Never fails: a payload that does not parse, an insecure page and a
/// cancelled run all come back as `{success: false, error}`.
pub async fn execute_fill_script(doc: &mut Document, payload: &str) -> FillResponse {
    let executor = FillExecutor::new(EngineConfig::default());
    let script = match FillScript::parse(payload) {
        Ok(script) => script,
        Err(err) => return FillResponse::failure(err.to_string()),
    };
    match executor.execute(doc, &script).await {
        Ok(_) => FillResponse::ok(),
        Err(err) => FillResponse::failure(err.to_string()),
    }
}
