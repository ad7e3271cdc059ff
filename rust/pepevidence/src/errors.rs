use fdrcalib::CalibrationError;
use std::path::PathBuf;

use crate::models::PipelineStage;

#[derive(Debug)]
pub enum EvidenceReadingError {
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Xml {
        source: quick_xml::Error,
        position: u64,
    },
    UnexpectedEof {
        open_element: String,
    },
    Csv(csv::Error),
    Json(serde_json::Error),
    MissingAttribute {
        element: String,
        attribute: String,
    },
    InvalidValue {
        field: String,
        value: String,
    },
    Calibration(CalibrationError),
}

impl std::fmt::Display for EvidenceReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => match path {
                Some(path) => write!(f, "Error reading file {}: {}", path.display(), source),
                None => write!(f, "Error reading input: {}", source),
            },
            Self::Xml { source, position } => {
                write!(f, "Malformed XML at byte {}: {}", position, source)
            }
            Self::UnexpectedEof { open_element } => {
                write!(f, "Document ended inside <{}>", open_element)
            }
            Self::Csv(e) => write!(f, "Error reading table: {}", e),
            Self::Json(e) => write!(f, "Error reading JSON: {}", e),
            Self::MissingAttribute { element, attribute } => {
                write!(f, "Element <{}> has no attribute '{}'", element, attribute)
            }
            Self::InvalidValue { field, value } => {
                write!(f, "Invalid value for {}: '{}'", field, value)
            }
            Self::Calibration(e) => write!(f, "Invalid calibration table: {}", e),
        }
    }
}

impl std::error::Error for EvidenceReadingError {}

impl EvidenceReadingError {
    pub fn io_at(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for EvidenceReadingError {
    fn from(x: std::io::Error) -> Self {
        Self::Io {
            source: x,
            path: None,
        }
    }
}

impl From<csv::Error> for EvidenceReadingError {
    fn from(x: csv::Error) -> Self {
        Self::Csv(x)
    }
}

impl From<serde_json::Error> for EvidenceReadingError {
    fn from(x: serde_json::Error) -> Self {
        Self::Json(x)
    }
}

impl From<CalibrationError> for EvidenceReadingError {
    fn from(x: CalibrationError) -> Self {
        Self::Calibration(x)
    }
}

#[derive(Debug)]
pub enum CacheError {
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Serialization(serde_json::Error),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { source, path } => {
                write!(f, "Cache I/O error at {}: {}", path.display(), source)
            }
            Self::Serialization(e) => write!(f, "Cache serialization error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug)]
pub enum ExportError {
    NotReady(PipelineStage),
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    Serialization(serde_json::Error),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady(stage) => write!(
                f,
                "Evidence set is at stage {:?}, call prepare_for_export first",
                stage
            ),
            Self::Io { source, path } => {
                write!(f, "Error writing {}: {}", path.display(), source)
            }
            Self::Serialization(e) => write!(f, "Error serializing evidence: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

#[derive(Debug)]
pub enum PepEvidenceError {
    Reading(EvidenceReadingError),
    Cache(CacheError),
    Export(ExportError),
}

impl std::fmt::Display for PepEvidenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading(e) => write!(f, "{}", e),
            Self::Cache(e) => write!(f, "{}", e),
            Self::Export(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PepEvidenceError {}

pub type Result<T> = std::result::Result<T, PepEvidenceError>;

impl From<EvidenceReadingError> for PepEvidenceError {
    fn from(x: EvidenceReadingError) -> Self {
        Self::Reading(x)
    }
}

impl From<CacheError> for PepEvidenceError {
    fn from(x: CacheError) -> Self {
        Self::Cache(x)
    }
}

impl From<ExportError> for PepEvidenceError {
    fn from(x: ExportError) -> Self {
        Self::Export(x)
    }
}
