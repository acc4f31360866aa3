//! Export command handler

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::auth::{ClientOptions, LoginOutcome, authenticate_with};
use crate::cli::error::CliError;
use crate::config::ExportConfig;
use crate::endpoint::Endpoint;
use crate::export::StudyExporter;
use crate::progress::{NoProgress, ProgressReporter, TerminalProgress};

/// Arguments for the export command, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    pub slug: String,
    pub username: Option<String>,
    pub server: Option<String>,
    pub output: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub no_index: bool,
    pub no_progress: bool,
    pub config: Option<PathBuf>,
}

/// Arguments merged with configuration and defaults
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub slug: String,
    pub username: String,
    pub endpoint: Endpoint,
    pub output: PathBuf,
    pub batch_size: usize,
    pub include_index: bool,
    pub progress: bool,
    pub client_options: ClientOptions,
}

/// Reject slugs that cannot double as a file name
fn validate_slug(slug: &str) -> Result<(), CliError> {
    if slug.trim().is_empty() {
        return Err(CliError::InvalidArgument(
            "Study slug must not be empty".to_string(),
        ));
    }
    if slug.contains(['/', '\\']) || slug == "." || slug == ".." {
        return Err(CliError::InvalidArgument(format!(
            "Study slug '{}' is not a valid file name",
            slug
        )));
    }
    Ok(())
}

impl ExportSettings {
    /// Load the configuration named by `args` (or `.edd-export.toml` in the
    /// current directory) and merge the arguments into it
    pub fn resolve(args: &ExportArgs) -> Result<Self, CliError> {
        let config = match &args.config {
            Some(path) => ExportConfig::load_file(path)?,
            None => ExportConfig::load(Path::new("."))?,
        };
        Self::from_config(args, &config)
    }

    /// Merge `args` over `config`; command line values win
    pub fn from_config(args: &ExportArgs, config: &ExportConfig) -> Result<Self, CliError> {
        validate_slug(&args.slug)?;

        let batch_size = args.batch_size.unwrap_or(config.export.batch_size);
        if batch_size == 0 {
            return Err(CliError::InvalidArgument(
                "--batch-size must be at least 1".to_string(),
            ));
        }

        let server = args.server.as_deref().unwrap_or(&config.server.host);
        let endpoint = Endpoint::parse(server)?;
        let username = config.resolve_username(args.username.as_deref())?;
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| config.export.output_dir.join(format!("{}.csv", args.slug)));

        Ok(Self {
            slug: args.slug.clone(),
            username,
            endpoint,
            output,
            batch_size,
            include_index: config.export.include_index && !args.no_index,
            progress: config.export.progress && !args.no_progress,
            client_options: config.client_options(),
        })
    }
}

/// Ask for the password on the terminal without echo
pub fn prompt_password(username: &str) -> Result<SecretString, CliError> {
    rpassword::prompt_password(format!("Password for {}: ", username))
        .map(SecretString::from)
        .map_err(|e| CliError::PasswordPrompt(e.to_string()))
}

/// Handle the export command: prompt for the password, then export
pub fn handle_export(args: &ExportArgs) -> Result<PathBuf, CliError> {
    let settings = ExportSettings::resolve(args)?;
    let password = prompt_password(&settings.username)?;
    run_export(&settings, password)
}

/// Log in, export the study and write it to `settings.output`.
///
/// A rejected login returns [`CliError::LoginFailed`] before any export
/// request is made, and nothing is written.
pub fn run_export(settings: &ExportSettings, password: SecretString) -> Result<PathBuf, CliError> {
    let outcome = authenticate_with(
        &settings.endpoint,
        &settings.username,
        password,
        &settings.client_options,
    )?;
    let session = match outcome {
        LoginOutcome::Authenticated(session) => session,
        LoginOutcome::Rejected { username } => return Err(CliError::LoginFailed(username)),
    };

    let progress: Box<dyn ProgressReporter> = if settings.progress {
        Box::new(TerminalProgress::new())
    } else {
        Box::new(NoProgress)
    };

    let assembly = StudyExporter::new(&session, &settings.endpoint)
        .batch_size(settings.batch_size)
        .progress(progress.as_ref())
        .export(&settings.slug)?;

    if let Some(parent) = settings.output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::FileWriteError(
                settings.output.clone(),
                format!("Failed to create directory: {}", e),
            )
        })?;
    }

    let path = assembly
        .table
        .save_csv(&settings.output, settings.include_index)
        .map_err(|e| CliError::FileWriteError(settings.output.clone(), e.to_string()))?;

    println!(
        "✅ Exported {} rows of study '{}' to {}",
        assembly.table.len(),
        settings.slug,
        path.display()
    );

    Ok(path)
}
