//! SharePoint REST (`/_api`) client
//!
//! Only used for reads Graph does not expose: site role assignments and
//! SharePoint group membership. Tokens are requested per tenant host
//! (`https://{hostname}/.default`).

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::{join_url, HttpCore, Query};
use super::sites::normalize_site_path;
use crate::auth::{sharepoint_scope, TokenProvider};
use crate::config::SharePointConfig;
use crate::error::{Error, Result};

const ACCEPT_NOMETADATA: &str = "application/json;odata=nometadata";

pub struct SharePointRestClient {
    core: HttpCore,
    base_override: Option<String>,
}

impl SharePointRestClient {
    pub fn new(config: &SharePointConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self {
            core: HttpCore::new(tokens, config.timeout())?,
            base_override: config
                .endpoints()
                .rest_base
                .as_ref()
                .map(|b| b.trim_end_matches('/').to_string()),
        })
    }

    /// Scope calls to one site.
    pub fn site(&self, hostname: &str, site_path: &str) -> Result<SiteEndpoint<'_>> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(Error::InvalidArgument("hostname must not be empty".into()));
        }
        let origin = match self.base_override {
            Some(ref base) => base.clone(),
            None => format!("https://{}", hostname),
        };
        Ok(SiteEndpoint {
            core: &self.core,
            base: format!("{}{}", origin, normalize_site_path(site_path)),
            scope: sharepoint_scope(hostname),
        })
    }
}

/// REST calls rooted at `https://{hostname}{site_path}`.
pub struct SiteEndpoint<'a> {
    core: &'a HttpCore,
    base: String,
    scope: String,
}

impl SiteEndpoint<'_> {
    pub fn url(&self, api_path: &str) -> String {
        join_url(&self.base, api_path)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn request(
        &self,
        method: Method,
        api_path: &str,
        query: Option<Query<'_>>,
        json_body: Option<&Value>,
        extra_headers: Option<&[(&str, &str)]>,
    ) -> Result<Value> {
        let mut headers = vec![("Accept", ACCEPT_NOMETADATA)];
        headers.extend_from_slice(extra_headers.unwrap_or_default());
        self.core
            .request_json(
                &self.scope,
                method,
                &self.url(api_path),
                query,
                json_body,
                Some(headers.as_slice()),
            )
            .await
    }

    /// GET a collection in either OData envelope, following continuation links.
    pub async fn get_list<T: DeserializeOwned>(&self, api_path: &str, query: Query<'_>) -> Result<Vec<T>> {
        self.core
            .get_all_pages(&self.scope, &self.url(api_path), query, ACCEPT_NOMETADATA)
            .await
    }
}
