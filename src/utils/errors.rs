#![forbid(unsafe_code)]

use poem_openapi::Object;
use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("haiku_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    /// The upstream credential must come from the environment.
    #[error("The AI service credential environment variable is not set: {}", .0)]
    MissingApiKey(String),

    #[error("Fallback table error: {}", .0)]
    FallbackTable(String),

    #[error("Haiku Error: {}", .0)]
    HaikuError(String),
}

// ***************************************************************************
//                             HTTP Error Body
// ***************************************************************************
/// Body returned with every non-200 response.
#[derive(Object, Debug)]
pub struct HttpError {
    pub error: String,
}

impl HttpError {
    pub fn new(error: String) -> Self {
        Self {error}
    }
}
