use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid calibration table: {0}")]
    Calibration(#[from] fdrcalib::CalibrationError),

    #[error(transparent)]
    Evidence(#[from] pepevidence::PepEvidenceError),

    #[error("Error interpreting the config: {0}")]
    Config(String),
}

impl From<pepevidence::errors::EvidenceReadingError> for CliError {
    fn from(e: pepevidence::errors::EvidenceReadingError) -> Self {
        CliError::Evidence(e.into())
    }
}

impl From<pepevidence::errors::CacheError> for CliError {
    fn from(e: pepevidence::errors::CacheError) -> Self {
        CliError::Evidence(e.into())
    }
}

impl From<pepevidence::errors::ExportError> for CliError {
    fn from(e: pepevidence::errors::ExportError) -> Self {
        CliError::Evidence(e.into())
    }
}
