//! App-only authentication against Microsoft Entra ID
//!
//! Implements the OAuth2 client-credentials flow and caches one bearer
//! token per requested scope.

pub mod oauth;
pub mod tokens;

use async_trait::async_trait;

pub use oauth::ClientCredentialsProvider;
pub use tokens::{AccessToken, TokenCache, EXPIRY_MARGIN};

use crate::error::Result;

/// Scope for Microsoft Graph.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Scope for the SharePoint REST API of one tenant host.
pub fn sharepoint_scope(hostname: &str) -> String {
    format!("https://{}/.default", hostname)
}

/// Source of bearer tokens for the HTTP clients
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A token for `scope` that is not within the expiry margin.
    async fn acquire(&self, scope: &str) -> Result<AccessToken>;

    /// Drop any cached token for `scope`.
    async fn invalidate(&self, scope: &str);
}
