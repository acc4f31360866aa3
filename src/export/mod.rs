//! Study export
//!
//! Resolves a study slug to its id, asks the server how many rows the export
//! holds and then streams the export, assembling it batch by batch into a
//! single [`Table`].

pub mod assembler;
pub mod table;

use std::fmt;
use std::io::{BufRead, BufReader};

use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use assembler::{AssembleError, Assembly, AssemblyStats, DEFAULT_BATCH_SIZE, TableAssembler};
pub use table::Table;

use crate::auth::Session;
use crate::endpoint::Endpoint;
use crate::error::{ExportError, ExportResult, Step};
use crate::progress::{NoProgress, ProgressReporter};

/// Response header carrying the expected export row count
pub const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// Internal numeric identifier of a study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudyId(pub u64);

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the study search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySummary {
    pub pk: StudyId,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StudyPage {
    #[serde(default)]
    results: Vec<StudySummary>,
}

/// Pick the study a slug refers to.
///
/// A single result is taken as is. Among several results exactly one must
/// carry the slug verbatim.
fn select_study(slug: &str, mut results: Vec<StudySummary>) -> ExportResult<StudySummary> {
    match results.len() {
        0 => Err(ExportError::NotFound {
            slug: slug.to_string(),
        }),
        1 => Ok(results.remove(0)),
        count => {
            let mut exact: Vec<StudySummary> = results
                .into_iter()
                .filter(|s| s.slug.as_deref() == Some(slug))
                .collect();
            if exact.len() == 1 {
                Ok(exact.remove(0))
            } else {
                Err(ExportError::AmbiguousSlug {
                    slug: slug.to_string(),
                    count,
                })
            }
        }
    }
}

/// Read the expected row count from the count response headers
fn parse_total_count(response: &Response) -> Option<u64> {
    let value = response.headers().get(TOTAL_COUNT_HEADER)?;
    match value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(count) => Some(count),
        None => {
            warn!("Ignoring unparseable {} header: {:?}", TOTAL_COUNT_HEADER, value);
            None
        }
    }
}

/// Charset named by a Content-Type value, lowercased
fn declared_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_ascii_lowercase())
        } else {
            None
        }
    })
}

fn is_utf8_compatible(charset: &str) -> bool {
    matches!(charset, "utf-8" | "utf8" | "us-ascii" | "ascii")
}

fn check_status(response: Response, step: Step) -> ExportResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ExportError::HttpStatus { step, status })
    }
}

/// Exports studies over an authenticated session
pub struct StudyExporter<'a> {
    session: &'a Session,
    endpoint: &'a Endpoint,
    batch_size: usize,
    progress: &'a dyn ProgressReporter,
}

impl<'a> StudyExporter<'a> {
    pub fn new(session: &'a Session, endpoint: &'a Endpoint) -> Self {
        Self {
            session,
            endpoint,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: &NoProgress,
        }
    }

    /// Number of data lines parsed per batch
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Where progress events are reported
    pub fn progress(mut self, progress: &'a dyn ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    fn get(&self, url: reqwest::Url, step: Step) -> ExportResult<Response> {
        debug!("GET {}", url);
        let response = self
            .session
            .client()
            .get(url)
            .send()
            .map_err(ExportError::network(step))?;
        check_status(response, step)
    }

    /// Resolve a slug to the study it names
    pub fn resolve(&self, slug: &str) -> ExportResult<StudySummary> {
        let url = self.endpoint.study_lookup_url(slug)?;
        let response = self.get(url, Step::Lookup)?;
        let page: StudyPage = response
            .json()
            .map_err(|e| ExportError::MalformedResponse {
                step: Step::Lookup,
                message: e.to_string(),
            })?;

        let study = select_study(slug, page.results)?;
        info!("Resolved study '{}' to id {}", slug, study.pk);
        Ok(study)
    }

    /// Expected number of export rows, if the server reports one.
    ///
    /// Only the response headers are read.
    pub fn expected_rows(&self, study_id: StudyId) -> ExportResult<Option<u64>> {
        let url = self.endpoint.export_url(study_id)?;
        let response = self.get(url, Step::Count)?;
        let count = parse_total_count(&response);
        match count {
            Some(count) => debug!("Study {} export reports {} rows", study_id, count),
            None => warn!(
                "Study {} export sent no {} header; progress will be indeterminate",
                study_id, TOTAL_COUNT_HEADER
            ),
        }
        Ok(count)
    }

    /// Stream the export of a resolved study into a table
    pub fn stream(&self, study_id: StudyId, expected_rows: Option<u64>) -> ExportResult<Assembly> {
        let url = self.endpoint.stream_export_url(study_id)?;
        let response = self.get(url, Step::Stream)?;

        if let Some(charset) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(declared_charset)
            && !is_utf8_compatible(&charset)
        {
            return Err(ExportError::UnsupportedEncoding { study_id, charset });
        }

        let lines = BufReader::new(response).lines();
        let assembly = TableAssembler::new(self.batch_size, self.progress)
            .assemble(lines, expected_rows)
            .map_err(|e| ExportError::from_assemble(study_id, e))?;

        if assembly.stats.count_mismatch() {
            warn!(
                "Study {} export announced {} rows but {} arrived",
                study_id,
                assembly.stats.expected_rows.unwrap_or_default(),
                assembly.stats.rows_received
            );
        }
        info!(
            "Downloaded {} rows in {} batches ({}, {:.0} rows/s)",
            assembly.stats.rows_received,
            assembly.stats.batches_parsed,
            assembly.stats.duration_string(),
            assembly.stats.throughput()
        );

        Ok(assembly)
    }

    /// Resolve, count and stream a study in one call
    pub fn export(&self, slug: &str) -> ExportResult<Assembly> {
        let study = self.resolve(slug)?;
        let expected = self.expected_rows(study.pk)?;
        self.stream(study.pk, expected)
    }
}

/// Export the study named by `slug` as a table with default settings
pub fn export_study(session: &Session, slug: &str, endpoint: &Endpoint) -> ExportResult<Table> {
    StudyExporter::new(session, endpoint)
        .export(slug)
        .map(|assembly| assembly.table)
}
