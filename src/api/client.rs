//! Authenticated HTTP plumbing shared by the Graph and SharePoint REST clients
//!
//! Attaches bearer tokens, translates non-2xx responses into [`Error`]
//! variants and follows OData pagination links.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::TokenProvider;
use crate::error::{Error, Result};

/// Query string pairs, e.g. `[("$select", "id,name")]`.
pub type Query<'a> = &'a [(&'a str, &'a str)];

/// Reqwest client plus the token source. One per API surface.
pub struct HttpCore {
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpCore {
    pub fn new(tokens: Arc<dyn TokenProvider>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::from_reqwest(e, "failed to build HTTP client"))?;
        Ok(Self { http, tokens })
    }

    /// Send one request with a bearer token for `scope` and check its status.
    /// `build` adds query, headers and body to the prepared request.
    pub async fn send<F>(&self, scope: &str, method: Method, url: &str, build: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder + Send,
    {
        let token = self.tokens.acquire(scope).await?;
        let request = format!("{} {}", method, url);
        tracing::debug!("{}", request);

        let builder = self
            .http
            .request(method, url)
            .bearer_auth(token.secret());
        let resp = build(builder)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, format!("{} failed", request)))?;

        self.check_response(resp, scope, &request).await
    }

    /// Generic JSON request: optional query, JSON body and extra headers.
    pub async fn request_json(
        &self,
        scope: &str,
        method: Method,
        url: &str,
        query: Option<Query<'_>>,
        json_body: Option<&Value>,
        extra_headers: Option<&[(&str, &str)]>,
    ) -> Result<Value> {
        let context = format!("{} {}", method, url);
        let resp = self
            .send(scope, method, url, |mut b| {
                if let Some(q) = query {
                    b = b.query(q);
                }
                if let Some(body) = json_body {
                    b = b.json(body);
                }
                for (name, value) in extra_headers.unwrap_or_default() {
                    b = b.header(*name, *value);
                }
                b
            })
            .await?;
        decode_json(resp, &context).await
    }

    /// GET every page of a collection starting at `url`.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        scope: &str,
        url: &str,
        query: Query<'_>,
        accept: &str,
    ) -> Result<Vec<T>> {
        let accept_header = [("Accept", accept)];
        let mut items = Vec::new();
        let mut next: Option<String> = None;
        let mut page = 0usize;

        loop {
            // nextLink already carries the query string
            let (target, q) = match next.as_deref() {
                Some(link) => (link, None),
                None => (url, Some(query)),
            };
            let body = self
                .request_json(
                    scope,
                    Method::GET,
                    target,
                    q,
                    None,
                    Some(&accept_header[..]),
                )
                .await?;

            next = next_link(&body).map(String::from);
            for value in page_values(body) {
                let item = serde_json::from_value(value).map_err(|source| Error::Decode {
                    context: format!("item in page {} of {}", page, url),
                    source,
                })?;
                items.push(item);
            }

            page += 1;
            match next {
                Some(ref link) => tracing::debug!("Following page {} of {}: {}", page, url, link),
                None => break,
            }
        }

        Ok(items)
    }

    /// Translate a non-2xx response. A 401 drops the scope's cached token first.
    async fn check_response(&self, resp: Response, scope: &str, request: &str) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Failed to read error body of {}: {}", request, e);
                String::new()
            }
        };
        let code = remote_error_code(&body);
        tracing::debug!("HTTP {} for {}: {}", status.as_u16(), request, body);

        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("401 Unauthorized for {}, dropping cached token", request);
                self.tokens.invalidate(scope).await;
                Err(Error::Authorization {
                    status: 401,
                    request: request.to_string(),
                    code,
                    body,
                })
            }
            StatusCode::FORBIDDEN => Err(Error::Authorization {
                status: 403,
                request: request.to_string(),
                code,
                body,
            }),
            StatusCode::NOT_FOUND => Err(Error::NotFound {
                resource: request.to_string(),
                status: Some(404),
                code,
                body,
            }),
            _ => Err(Error::Api {
                status: status.as_u16(),
                request: request.to_string(),
                code,
                body,
            }),
        }
    }
}

/// `base` + `path`, unless `path` is already absolute.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("https://") || path.starts_with("http://") {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Decode a JSON body; an empty body (204) becomes `null`.
pub async fn decode_json(resp: Response, context: &str) -> Result<Value> {
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| Error::from_reqwest(e, format!("reading body of {}", context)))?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
        context: context.to_string(),
        source,
    })
}

/// Continuation link of an OData page (v4, v3 nometadata and v3 verbose).
pub fn next_link(body: &Value) -> Option<&str> {
    body.get("@odata.nextLink")
        .or_else(|| body.get("odata.nextLink"))
        .or_else(|| body.pointer("/d/__next"))
        .and_then(Value::as_str)
}

/// Items of an OData page: `value` or `d.results`.
pub fn page_values(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("value") {
                return items;
            }
            match map.remove("d") {
                Some(Value::Object(mut d)) => match d.remove("results") {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Error code from a Graph (`error.code`), SharePoint REST (`odata.error.code`)
/// or OAuth-style (`error`) payload.
pub fn remote_error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let code = value
        .pointer("/error/code")
        .or_else(|| value.pointer("/odata.error/code"))
        .or_else(|| value.get("error").filter(|e| e.is_string()))?;
    code.as_str().map(String::from)
}
