//! Error types for login and study export

use std::fmt;
use std::io;

use thiserror::Error;

use crate::export::assembler::AssembleError;
use crate::export::StudyId;

/// Request phase an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// CSRF fetch or credential POST
    Login,
    /// Slug to study id lookup
    Lookup,
    /// Expected row count request
    Count,
    /// Streamed export download
    Stream,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Login => write!(f, "login"),
            Step::Lookup => write!(f, "study lookup"),
            Step::Count => write!(f, "export count"),
            Step::Stream => write!(f, "streamed export"),
        }
    }
}

/// Error type for everything the library does
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Network error during {step}: {source}")]
    Network {
        step: Step,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned {status} during {step}")]
    HttpStatus {
        step: Step,
        status: reqwest::StatusCode,
    },

    #[error("No csrftoken cookie returned by {url}")]
    MissingCsrfToken { url: String },

    #[error("Login failed for user '{username}'")]
    InvalidCredentials { username: String },

    #[error("No study found with slug '{slug}'")]
    NotFound { slug: String },

    #[error("Slug '{slug}' matched {count} studies")]
    AmbiguousSlug { slug: String, count: usize },

    #[error("Malformed response during {step}: {message}")]
    MalformedResponse { step: Step, message: String },

    #[error("Export of study {study_id} uses unsupported charset '{charset}'")]
    UnsupportedEncoding { study_id: StudyId, charset: String },

    #[error("Export of study {study_id} returned no header line")]
    EmptyStream { study_id: StudyId },

    #[error("Failed reading export stream of study {study_id}: {source}")]
    StreamRead {
        study_id: StudyId,
        #[source]
        source: io::Error,
    },

    #[error(
        "Invalid CSV in batch {batch} (starting at data row {first_row}) of study {study_id}: {source}"
    )]
    Parse {
        study_id: StudyId,
        batch: usize,
        first_row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

impl ExportError {
    pub(crate) fn network(step: Step) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ExportError::Network { step, source }
    }

    /// Attach the study id to an error raised while assembling its stream
    pub(crate) fn from_assemble(study_id: StudyId, err: AssembleError) -> Self {
        match err {
            AssembleError::EmptyStream => ExportError::EmptyStream { study_id },
            AssembleError::Read(source) => ExportError::StreamRead { study_id, source },
            AssembleError::Parse {
                batch,
                first_row,
                source,
            } => ExportError::Parse {
                study_id,
                batch,
                first_row,
                source,
            },
        }
    }
}

/// Result alias used across the crate
pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_display() {
        assert_eq!(Step::Login.to_string(), "login");
        assert_eq!(Step::Stream.to_string(), "streamed export");
    }

    #[test]
    fn test_assemble_errors_carry_study_id() {
        let err = ExportError::from_assemble(StudyId(42), AssembleError::EmptyStream);
        assert!(matches!(
            err,
            ExportError::EmptyStream {
                study_id: StudyId(42)
            }
        ));
        assert_eq!(
            err.to_string(),
            "Export of study 42 returned no header line"
        );
    }
}
