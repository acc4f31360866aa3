//! EDD export - download studies from an Electronic Data Depot instance
//!
//! Provides:
//! - Session login with CSRF token handling
//! - Slug to study id resolution
//! - Streamed export download assembled batch by batch into a [`Table`]
//! - Configuration file and progress reporting support
//!
//! ```rust,no_run
//! use edd_export::{Endpoint, LoginOutcome, authenticate, export_study};
//! use secrecy::SecretString;
//!
//! let endpoint = Endpoint::parse("edd.jbei.org")?;
//! let password = SecretString::from("hunter2".to_string());
//! if let LoginOutcome::Authenticated(session) = authenticate(&endpoint, "jdoe", password)? {
//!     let table = export_study(&session, "my-study", &endpoint)?;
//!     println!("{} rows", table.len());
//! }
//! # Ok::<(), edd_export::ExportError>(())
//! ```

pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod export;
pub mod progress;

pub use auth::{ClientOptions, LoginOutcome, Session, authenticate, authenticate_with};
pub use config::ExportConfig;
pub use endpoint::{DEFAULT_SERVER, Endpoint};
pub use error::{ExportError, ExportResult, Step};
pub use export::{
    Assembly, AssemblyStats, DEFAULT_BATCH_SIZE, StudyExporter, StudyId, StudySummary, Table,
    TableAssembler, export_study,
};
pub use progress::{NoProgress, ProgressReporter, TerminalProgress};
