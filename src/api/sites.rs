//! Site resolution

use super::encode_path;
use super::graph::GraphClient;
use crate::error::{Error, Result};
use crate::models::Site;

/// `"sites/Team/"` → `"/sites/Team"`; the root site is `""`.
pub fn normalize_site_path(site_path: &str) -> String {
    let trimmed = site_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

pub struct SiteService<'a> {
    graph: &'a GraphClient,
}

impl<'a> SiteService<'a> {
    pub fn new(graph: &'a GraphClient) -> Self {
        Self { graph }
    }

    /// Resolve `hostname` + server-relative `site_path` into a site.
    pub async fn get_site(&self, hostname: &str, site_path: &str) -> Result<Site> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(Error::InvalidArgument("hostname must not be empty".into()));
        }
        let path = normalize_site_path(site_path);
        let endpoint = site_endpoint(hostname, &path);

        tracing::debug!("Resolving site {}:{}", hostname, path);
        let site: Site = self
            .graph
            .get(&endpoint, &[])
            .await
            .map_err(|e| e.not_found_as(format!("site {}:{}", hostname, display_path(&path))))?;
        tracing::info!("Resolved site {} ({})", site.label(), site.id);
        Ok(site)
    }
}

fn site_endpoint(hostname: &str, path: &str) -> String {
    let host = encode_path(hostname);
    if path.is_empty() {
        format!("sites/{}", host)
    } else {
        format!("sites/{}:/{}", host, encode_path(path))
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
