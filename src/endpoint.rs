//! Server address handling and API URL construction

use reqwest::Url;

use crate::error::{ExportError, ExportResult};
use crate::export::StudyId;

/// Public EDD instance used when no server is given
pub const DEFAULT_SERVER: &str = "edd.jbei.org";

const LOGIN_PATH: &str = "accounts/login/";

/// Base URL of an EDD instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse a server given either as a bare host (`edd.jbei.org`, served
    /// over HTTPS) or as a full base URL (`http://localhost:8000/edd`).
    pub fn parse(server: &str) -> ExportResult<Self> {
        let server = server.trim();
        if server.is_empty() {
            return Err(ExportError::InvalidArgument(
                "Server must not be empty".to_string(),
            ));
        }

        let raw = if server.contains("://") {
            server.to_string()
        } else {
            format!("https://{}", server)
        };

        let mut base = Url::parse(&raw).map_err(|e| {
            ExportError::InvalidArgument(format!("Invalid server '{}': {}", server, e))
        })?;
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(ExportError::InvalidArgument(format!(
                "Invalid server '{}': no host",
                server
            )));
        }

        // Relative joins must land below the base path, not replace its last segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Host name, used for display
    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    fn join(&self, relative: &str) -> ExportResult<Url> {
        self.base.join(relative).map_err(|e| {
            ExportError::InvalidArgument(format!("Cannot build URL for '{}': {}", relative, e))
        })
    }

    /// Login page; also the Referer for the credential POST
    pub fn login_url(&self) -> ExportResult<Url> {
        self.join(LOGIN_PATH)
    }

    pub fn study_lookup_url(&self, slug: &str) -> ExportResult<Url> {
        self.join(&format!("rest/studies/?slug={}", urlencoding::encode(slug)))
    }

    /// Export metadata request, answered with the expected row count
    pub fn export_url(&self, study_id: StudyId) -> ExportResult<Url> {
        self.join(&format!("rest/export/?study_id={}", study_id))
    }

    pub fn stream_export_url(&self, study_id: StudyId) -> ExportResult<Url> {
        self.join(&format!("rest/stream-export/?study_id={}", study_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_uses_https() {
        let endpoint = Endpoint::parse("edd.jbei.org").unwrap();
        assert_eq!(endpoint.base().as_str(), "https://edd.jbei.org/");
        assert_eq!(endpoint.host(), "edd.jbei.org");
        assert_eq!(endpoint, Endpoint::parse(DEFAULT_SERVER).unwrap());
    }

    #[test]
    fn test_full_url_with_port_and_path() {
        let endpoint = Endpoint::parse("http://127.0.0.1:8000/edd").unwrap();
        assert_eq!(
            endpoint.login_url().unwrap().as_str(),
            "http://127.0.0.1:8000/edd/accounts/login/"
        );
    }

    #[test]
    fn test_api_urls() {
        let endpoint = Endpoint::parse("edd.example.org").unwrap();
        assert_eq!(
            endpoint.login_url().unwrap().as_str(),
            "https://edd.example.org/accounts/login/"
        );
        assert_eq!(
            endpoint.study_lookup_url("growth-curves").unwrap().as_str(),
            "https://edd.example.org/rest/studies/?slug=growth-curves"
        );
        assert_eq!(
            endpoint.export_url(StudyId(42)).unwrap().as_str(),
            "https://edd.example.org/rest/export/?study_id=42"
        );
        assert_eq!(
            endpoint.stream_export_url(StudyId(42)).unwrap().as_str(),
            "https://edd.example.org/rest/stream-export/?study_id=42"
        );
    }

    #[test]
    fn test_slug_is_encoded() {
        let endpoint = Endpoint::parse("edd.example.org").unwrap();
        let url = endpoint.study_lookup_url("a b&c").unwrap();
        assert_eq!(url.query(), Some("slug=a%20b%26c"));
    }

    #[test]
    fn test_invalid_servers() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse("   ").is_err());
        assert!(Endpoint::parse("file:///tmp/edd").is_err());
    }
}
