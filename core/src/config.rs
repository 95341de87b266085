//! Connection parameters for one CMS project.
//!
//! The library never reads the process environment. Hosts that keep the
//! credentials in `CMS_API_URL` / `CMS_API_KEY` / `CMS_PROJECT_ID` pass a
//! lookup closure to [`ClientConfig::from_lookup`].

use std::fmt;

use reqwest::header::HeaderValue;
use reqwest::Url;

use crate::error::{CmsError, CmsResult};

pub const ENV_API_URL: &str = "CMS_API_URL";
pub const ENV_API_KEY: &str = "CMS_API_KEY";
pub const ENV_PROJECT_ID: &str = "CMS_PROJECT_ID";

/// Immutable connection configuration, shared read-only by every request.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_url: String,
    api_key: String,
    project_id: String,
}

impl ClientConfig {
    /// Validate and normalize the three connection parameters.
    ///
    /// `api_url` must be an absolute `http`/`https` URL with a host; trailing
    /// slashes are stripped. All values are trimmed and must be non-empty.
    /// `api_key` and `project_id` travel in headers, so they must be valid
    /// header values (no control characters).
    pub fn new(api_url: &str, api_key: &str, project_id: &str) -> CmsResult<Self> {
        let api_url = api_url.trim().trim_end_matches('/');
        let api_key = api_key.trim();
        let project_id = project_id.trim();

        if api_url.is_empty() {
            return Err(CmsError::Config("api_url must not be empty".to_string()));
        }
        if api_key.is_empty() {
            return Err(CmsError::Config("api_key must not be empty".to_string()));
        }
        if project_id.is_empty() {
            return Err(CmsError::Config("project_id must not be empty".to_string()));
        }

        if HeaderValue::from_str(&format!("Bearer {api_key}")).is_err() {
            return Err(CmsError::Config(
                "api_key contains characters not allowed in an HTTP header".to_string(),
            ));
        }
        if HeaderValue::from_str(project_id).is_err() {
            return Err(CmsError::Config(format!(
                "project_id {project_id:?} contains characters not allowed in an HTTP header"
            )));
        }

        let parsed = Url::parse(api_url)
            .map_err(|e| CmsError::Config(format!("api_url `{api_url}` is not a valid URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CmsError::Config(format!(
                "api_url scheme must be http or https, got `{}`",
                parsed.scheme()
            )));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(CmsError::Config(format!("api_url `{api_url}` has no host")));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(CmsError::Config(format!(
                "api_url `{api_url}` must not carry a query or fragment"
            )));
        }

        Ok(Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            project_id: project_id.to_string(),
        })
    }

    /// Build a config from `CMS_API_URL`, `CMS_API_KEY` and `CMS_PROJECT_ID`
    /// resolved through `lookup`. A missing variable is a `Config` error.
    pub fn from_lookup<F>(lookup: F) -> CmsResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name).ok_or_else(|| CmsError::Config(format!("{name} is not set")))
        };
        Self::new(&get(ENV_API_URL)?, &get(ENV_API_KEY)?, &get(ENV_PROJECT_ID)?)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn valid_config_is_normalized() {
        let config = ClientConfig::new(" https://cms.example.com/api/ ", "k", "p").unwrap();
        assert_eq!(config.api_url(), "https://cms.example.com/api");
        assert_eq!(config.api_key(), "k");
        assert_eq!(config.project_id(), "p");
    }

    #[test]
    fn empty_api_url_is_rejected() {
        let err = ClientConfig::new("", "k", "p").unwrap_err();
        assert!(matches!(err, CmsError::Config(_)));
    }

    #[test]
    fn empty_key_and_project_are_rejected() {
        assert!(matches!(
            ClientConfig::new("http://localhost", "  ", "p"),
            Err(CmsError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::new("http://localhost", "k", ""),
            Err(CmsError::Config(_))
        ));
    }

    #[test]
    fn header_unsafe_key_and_project_are_rejected() {
        for (key, project) in [("abc\ndef", "p"), ("k\u{7f}", "p"), ("k", "blog\r\nx: y")] {
            let err = ClientConfig::new("http://localhost", key, project).unwrap_err();
            assert!(matches!(err, CmsError::Config(_)), "{key:?}/{project:?} should be rejected");
            assert!(!err.is_retryable());
        }
        let err = ClientConfig::new("http://localhost", "abc\ndef", "p").unwrap_err();
        assert!(!err.to_string().contains("abc"));
    }

    #[test]
    fn relative_and_non_http_urls_are_rejected() {
        for url in ["cms.example.com", "/api", "ftp://cms.example.com", "http://x/?a=1"] {
            let err = ClientConfig::new(url, "k", "p").unwrap_err();
            assert!(matches!(err, CmsError::Config(_)), "{url} should be rejected");
        }
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ClientConfig::new("http://localhost:3000", "super-secret", "p").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("localhost:3000"));
    }

    #[test]
    fn from_lookup_reads_the_three_variables() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_URL, "http://localhost:3000"),
            (ENV_API_KEY, "key"),
            (ENV_PROJECT_ID, "blog"),
        ]
        .into_iter()
        .collect();
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.project_id(), "blog");
    }

    #[test]
    fn from_lookup_reports_missing_variable() {
        let err = ClientConfig::from_lookup(|k| {
            (k != ENV_API_KEY).then(|| "http://localhost".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }
}
