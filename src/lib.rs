//! App-only SharePoint Online client
//!
//! Authenticates with the OAuth2 client-credentials flow, resolves sites,
//! lists and transfers files in document libraries through Microsoft Graph,
//! and computes a user's effective permissions on a site from SharePoint
//! role assignments.
//!
//! [`SharePointClient`] is the entry point:
//!
//! ```no_run
//! # async fn run() -> sharepoint::Result<()> {
//! use std::time::Duration;
//! use sharepoint::{SharePointClient, SharePointConfig};
//!
//! let config = SharePointConfig::new("tenant-id", "client-id", "secret", Duration::from_secs(30))?;
//! let client = SharePointClient::new(config)?;
//! let site = client.get_site("contoso.sharepoint.com", "/sites/Team").await?;
//! let drive = client.get_drive_by_name(&site, "Documents").await?;
//! for item in client.list_root_items(&drive).await? {
//!     println!("{}", item.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::SharePointClient;
pub use config::{Endpoints, SharePointConfig};
pub use error::{Error, ErrorKind, Result};
