//! OAuth2 client-credentials flow for Entra ID

use std::sync::atomic::{AtomicU16, Ordering};

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    Scope, TokenResponse, TokenUrl,
};
use tokio::sync::Mutex;

use super::{AccessToken, TokenCache, TokenProvider};
use crate::config::SharePointConfig;
use crate::error::{Error, Result};

/// Client-credentials token provider with an in-memory cache.
///
/// The cache lock is held across the exchange, so concurrent callers asking
/// for the same scope wait for one exchange instead of racing.
pub struct ClientCredentialsProvider {
    client: BasicClient,
    http: reqwest::Client,
    cache: Mutex<TokenCache>,
}

impl ClientCredentialsProvider {
    pub fn new(config: &SharePointConfig) -> Result<Self> {
        let auth_url = AuthUrl::new(config.authorize_url())
            .map_err(|e| Error::Config(format!("invalid authority: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url())
            .map_err(|e| Error::Config(format!("invalid authority: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(config.client_id().to_string()),
            Some(ClientSecret::new(config.client_secret().to_string())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        // Entra ID never redirects the token endpoint; following one would leak the secret.
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::from_reqwest(e, "failed to build token HTTP client"))?;

        Ok(Self {
            client,
            http,
            cache: Mutex::new(TokenCache::default()),
        })
    }

    async fn exchange(&self, scope: &str) -> Result<AccessToken> {
        tracing::info!("Requesting app-only token for {}", scope);

        let last_status = AtomicU16::new(0);
        let result = self
            .client
            .exchange_client_credentials()
            .add_scope(Scope::new(scope.to_string()))
            .request_async(|request| send_token_request(&self.http, request, &last_status))
            .await;

        let status = match last_status.load(Ordering::Relaxed) {
            0 => None,
            s => Some(s),
        };

        match result {
            Ok(response) => {
                tracing::debug!("Token for {} acquired", scope);
                Ok(AccessToken::new(
                    response.access_token().secret().to_string(),
                    scope,
                    response.expires_in(),
                ))
            }
            Err(RequestTokenError::ServerResponse(err)) => Err(Error::Authentication {
                status,
                message: err.to_string(),
            }),
            Err(RequestTokenError::Request(e)) => Err(Error::from_reqwest(
                e,
                format!("token request for {} failed", scope),
            )),
            Err(RequestTokenError::Parse(e, body)) => Err(Error::Authentication {
                status,
                message: format!(
                    "unreadable token response ({}): {}",
                    e,
                    String::from_utf8_lossy(&body)
                ),
            }),
            Err(RequestTokenError::Other(message)) => Err(Error::Authentication { status, message }),
        }
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn acquire(&self, scope: &str) -> Result<AccessToken> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(scope) {
            return Ok(token);
        }
        let token = self.exchange(scope).await?;
        cache.insert(token.clone());
        Ok(token)
    }

    async fn invalidate(&self, scope: &str) {
        if self.cache.lock().await.remove(scope) {
            tracing::debug!("Invalidated cached token for {}", scope);
        }
    }
}

/// `oauth2` HTTP hook that reuses our reqwest client (and its timeout) and
/// records the response status for error reporting.
async fn send_token_request(
    http: &reqwest::Client,
    request: HttpRequest,
    last_status: &AtomicU16,
) -> std::result::Result<HttpResponse, reqwest::Error> {
    let response = http
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    last_status.store(status_code.as_u16(), Ordering::Relaxed);
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
