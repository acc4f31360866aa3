//! CLI-specific error types

use std::path::PathBuf;

use thiserror::Error;

use crate::error::ExportError;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Login failed for user '{0}'")]
    LoginFailed(String),

    #[error("Failed to read password: {0}")]
    PasswordPrompt(String),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Export(#[from] ExportError),
}
