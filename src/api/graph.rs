//! Microsoft Graph v1.0 client

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::{decode_json, join_url, HttpCore, Query};
use crate::auth::{TokenProvider, GRAPH_SCOPE};
use crate::config::SharePointConfig;
use crate::error::{Error, Result};

const ACCEPT_JSON: &str = "application/json";

/// Graph client: bearer token for `https://graph.microsoft.com/.default`.
pub struct GraphClient {
    core: HttpCore,
    base_url: String,
}

impl GraphClient {
    pub fn new(config: &SharePointConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self {
            core: HttpCore::new(tokens, config.timeout())?,
            base_url: config.endpoints().graph_base.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for a Graph path.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Arbitrary Graph call returning the decoded JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<Query<'_>>,
        json_body: Option<&Value>,
        extra_headers: Option<&[(&str, &str)]>,
    ) -> Result<Value> {
        let mut headers = vec![("Accept", ACCEPT_JSON)];
        headers.extend_from_slice(extra_headers.unwrap_or_default());
        self.core
            .request_json(
                GRAPH_SCOPE,
                method,
                &self.url(path),
                query,
                json_body,
                Some(headers.as_slice()),
            )
            .await
    }

    /// GET a single resource and deserialize it.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: Query<'_>) -> Result<T> {
        let value = self
            .request(Method::GET, path, Some(query), None, None)
            .await?;
        serde_json::from_value(value).map_err(|source| Error::Decode {
            context: format!("GET {}", path),
            source,
        })
    }

    /// GET a collection, following `@odata.nextLink` to the end.
    pub async fn get_paged<T: DeserializeOwned>(&self, path: &str, query: Query<'_>) -> Result<Vec<T>> {
        self.core
            .get_all_pages(GRAPH_SCOPE, &self.url(path), query, ACCEPT_JSON)
            .await
    }

    /// PUT a binary body (simple upload) and deserialize the response.
    pub async fn put_bytes<T: DeserializeOwned>(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("PUT {} ({} bytes)", url, data.len());
        let resp = self
            .core
            .send(GRAPH_SCOPE, Method::PUT, &url, |b| {
                b.header(CONTENT_TYPE, content_type)
                    .header("Accept", ACCEPT_JSON)
                    .body(data)
            })
            .await?;
        let context = format!("PUT {}", url);
        let value = decode_json(resp, &context).await?;
        serde_json::from_value(value).map_err(|source| Error::Decode { context, source })
    }

    /// GET returning the raw response for streaming. Redirects to
    /// pre-authenticated download URLs are followed by reqwest.
    pub async fn get_stream(&self, path: &str) -> Result<Response> {
        self.core
            .send(GRAPH_SCOPE, Method::GET, &self.url(path), |b| b)
            .await
    }
}
