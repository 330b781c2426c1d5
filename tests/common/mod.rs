//! Shared helpers for the wiremock-backed integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::MockServer;

use sharepoint::auth::{AccessToken, TokenProvider};
use sharepoint::{Endpoints, Result, SharePointClient, SharePointConfig};

pub const TENANT: &str = "tenant-1";
pub const HOSTNAME: &str = "contoso.sharepoint.com";
pub const SITE_PATH: &str = "/sites/Team";
pub const SITE_ID: &str = "contoso.sharepoint.com,1111,2222";
pub const DRIVE_ID: &str = "drive-1";
pub const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

/// Token provider that hands out `token-{scope}` and records every call.
#[derive(Default)]
pub struct StaticTokens {
    acquired: AtomicUsize,
    invalidated: Mutex<Vec<String>>,
}

impl StaticTokens {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn acquire(&self, scope: &str) -> Result<AccessToken> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(
            format!("token-{}", scope),
            scope,
            Some(Duration::from_secs(3600)),
        ))
    }

    async fn invalidate(&self, scope: &str) {
        self.invalidated.lock().unwrap().push(scope.to_string());
    }
}

/// Configuration whose endpoints all point at `server`.
pub fn config(server: &MockServer, timeout: Duration) -> SharePointConfig {
    config_for(&server.uri(), timeout)
}

pub fn config_for(base: &str, timeout: Duration) -> SharePointConfig {
    SharePointConfig::new(TENANT, "client-1", "secret-1", timeout)
        .unwrap()
        .with_endpoints(Endpoints::single_origin(base))
        .unwrap()
}

/// Client backed by [`StaticTokens`].
pub fn client(server: &MockServer) -> (SharePointClient, Arc<StaticTokens>) {
    client_with_timeout(server, Duration::from_secs(5))
}

pub fn client_with_timeout(server: &MockServer, timeout: Duration) -> (SharePointClient, Arc<StaticTokens>) {
    let tokens = Arc::new(StaticTokens::default());
    let client = SharePointClient::with_token_provider(config(server, timeout), tokens.clone()).unwrap();
    (client, tokens)
}

/// Client for a base URL not served by wiremock.
pub fn client_for_base(base: &str) -> (SharePointClient, Arc<StaticTokens>) {
    let tokens = Arc::new(StaticTokens::default());
    let client =
        SharePointClient::with_token_provider(config_for(base, Duration::from_secs(5)), tokens.clone())
            .unwrap();
    (client, tokens)
}

/// Plain HTTP server that answers every request with `status`, announces
/// `Content-Length: 1000` but sends only `body` before closing the socket.
/// Returns the base URL.
pub async fn truncating_server(status: &'static str, body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: 1000\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
                status
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body).await;
            let _ = socket.flush().await;
        }
    });
    format!("http://{}", addr)
}

pub fn site_json() -> Value {
    json!({
        "id": SITE_ID,
        "name": "Team",
        "displayName": "Team Site",
        "webUrl": "https://contoso.sharepoint.com/sites/Team"
    })
}

pub fn token_json(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}
