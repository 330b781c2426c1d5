//! Facade over the token provider, both transports and every service

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::{
    DriveService, GraphClient, PermissionService, SharePointRestClient, SiteService,
};
use crate::auth::{AccessToken, ClientCredentialsProvider, TokenProvider, GRAPH_SCOPE};
use crate::config::SharePointConfig;
use crate::error::Result;
use crate::models::{Drive, DriveItem, Site, UserSitePermissions};

/// App-only SharePoint Online client.
///
/// Owns one token provider shared by the Graph and SharePoint REST clients.
/// Instances share nothing with each other.
pub struct SharePointClient {
    config: SharePointConfig,
    tokens: Arc<dyn TokenProvider>,
    graph: GraphClient,
    rest: SharePointRestClient,
}

impl SharePointClient {
    /// Client using the OAuth2 client-credentials flow from `config`.
    pub fn new(config: SharePointConfig) -> Result<Self> {
        let tokens: Arc<dyn TokenProvider> = Arc::new(ClientCredentialsProvider::new(&config)?);
        Self::with_token_provider(config, tokens)
    }

    /// Client using a caller-supplied token source.
    pub fn with_token_provider(config: SharePointConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let graph = GraphClient::new(&config, Arc::clone(&tokens))?;
        let rest = SharePointRestClient::new(&config, Arc::clone(&tokens))?;
        Ok(Self {
            config,
            tokens,
            graph,
            rest,
        })
    }

    pub fn config(&self) -> &SharePointConfig {
        &self.config
    }

    pub fn graph(&self) -> &GraphClient {
        &self.graph
    }

    pub fn rest(&self) -> &SharePointRestClient {
        &self.rest
    }

    /// Acquire a Graph token, proving the credentials are accepted.
    pub async fn authenticate(&self) -> Result<AccessToken> {
        self.tokens.acquire(GRAPH_SCOPE).await
    }

    pub async fn get_site(&self, hostname: &str, site_path: &str) -> Result<Site> {
        SiteService::new(&self.graph).get_site(hostname, site_path).await
    }

    pub async fn list_drives(&self, site: &Site) -> Result<Vec<Drive>> {
        self.drives().list_drives(site).await
    }

    pub async fn get_drive_by_name(&self, site: &Site, name: &str) -> Result<Drive> {
        self.drives().get_drive_by_name(site, name).await
    }

    pub async fn list_root_items(&self, drive: &Drive) -> Result<Vec<DriveItem>> {
        self.drives().list_root_items(&drive.id).await
    }

    pub async fn list_folder_items(&self, drive: &Drive, folder_path: &str) -> Result<Vec<DriveItem>> {
        self.drives().list_folder_items(&drive.id, folder_path).await
    }

    pub async fn list_items_by_id(&self, drive: &Drive, item_id: &str) -> Result<Vec<DriveItem>> {
        self.drives().list_items_by_id(&drive.id, item_id).await
    }

    pub async fn get_item_by_path(&self, drive: &Drive, item_path: &str) -> Result<DriveItem> {
        self.drives().get_item_by_path(&drive.id, item_path).await
    }

    pub async fn get_item_by_id(&self, drive: &Drive, item_id: &str) -> Result<DriveItem> {
        self.drives().get_item_by_id(&drive.id, item_id).await
    }

    pub async fn upload_file(&self, drive: &Drive, folder_path: &str, local_file: &Path) -> Result<DriveItem> {
        self.drives().upload_file(&drive.id, folder_path, local_file).await
    }

    pub async fn download_file(&self, drive: &Drive, item_id: &str, destination: &Path) -> Result<PathBuf> {
        self.drives().download_file(&drive.id, item_id, destination).await
    }

    pub async fn get_user_site_permissions(
        &self,
        user_email: &str,
        hostname: &str,
        site_path: &str,
    ) -> Result<UserSitePermissions> {
        PermissionService::new(&self.graph, &self.rest)
            .get_user_site_permissions(user_email, hostname, site_path)
            .await
    }

    fn drives(&self) -> DriveService<'_> {
        DriveService::new(&self.graph)
    }
}
