//! Client configuration
//!
//! [`SharePointConfig`] is the validated, immutable value the library runs on.
//! [`Settings`] is the on-disk form used by the CLI.

mod settings;

pub use settings::Settings;

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote endpoints. Defaults target the public Microsoft cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Identity provider authority, without tenant.
    pub authority: String,
    /// Graph API base URL including the version segment.
    pub graph_base: String,
    /// Replaces `https://{hostname}` for SharePoint REST calls when set.
    pub rest_base: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
            rest_base: None,
        }
    }
}

impl Endpoints {
    /// Point every surface at one base URL (mock servers, proxies).
    pub fn single_origin(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            authority: base.clone(),
            graph_base: base.clone(),
            rest_base: Some(base),
        }
    }

    fn validate(&self) -> Result<()> {
        let rest = self.rest_base.iter().map(|b| ("rest_base", b.as_str()));
        for (name, value) in [
            ("authority", self.authority.as_str()),
            ("graph_base", self.graph_base.as_str()),
        ]
        .into_iter()
        .chain(rest)
        {
            let parsed = url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} '{}' is not a URL: {}", name, value, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{} '{}' must be an http(s) URL",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Tenant and application identity plus request tuning.
#[derive(Clone)]
pub struct SharePointConfig {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    timeout: Duration,
    endpoints: Endpoints,
}

impl SharePointConfig {
    /// Validate and build a configuration. Identity fields are trimmed and
    /// must be non-empty; the timeout must be positive.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let tenant_id = required("tenant_id", tenant_id.into())?;
        let client_id = required("client_id", client_id.into())?;
        let client_secret = required("client_secret", client_secret.into())?;
        if timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            timeout,
            endpoints: Endpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Result<Self> {
        endpoints.validate()?;
        self.endpoints = endpoints;
        Ok(self)
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.endpoints.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }

    pub(crate) fn authorize_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.endpoints.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

impl fmt::Debug for SharePointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharePointConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

fn required(name: &str, value: String) -> Result<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(Error::Config(format!("{} must not be empty", name)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_rejects_empty_identity_fields() {
        for (t, c, s) in [("", "c", "s"), ("t", "  ", "s"), ("t", "c", "")] {
            let err = SharePointConfig::new(t, c, s, DEFAULT_TIMEOUT).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config);
        }
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = SharePointConfig::new("t", "c", "s", Duration::ZERO).unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_trims_identity_fields() {
        let config = SharePointConfig::new(" tenant ", "client", "secret", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(config.tenant_id(), "tenant");
        assert_eq!(
            config.token_url(),
            "https://login.microsoftonline.com/tenant/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = SharePointConfig::new("t", "c", "hunter2", DEFAULT_TIMEOUT).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_endpoints_validation() {
        let config = SharePointConfig::new("t", "c", "s", DEFAULT_TIMEOUT).unwrap();
        let bad = Endpoints {
            graph_base: "not a url".into(),
            ..Endpoints::default()
        };
        assert!(config.clone().with_endpoints(bad).is_err());

        let ftp = Endpoints {
            rest_base: Some("ftp://example.com".into()),
            ..Endpoints::default()
        };
        assert!(config.clone().with_endpoints(ftp).is_err());

        let config = config
            .with_endpoints(Endpoints::single_origin("http://127.0.0.1:8080/"))
            .unwrap();
        assert_eq!(
            config.token_url(),
            "http://127.0.0.1:8080/t/oauth2/v2.0/token"
        );
    }
}
