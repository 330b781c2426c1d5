//! SharePoint CLI - app-only access to SharePoint Online
//!
//! Resolves sites, browses and transfers files in document libraries and
//! reports a user's effective permissions on a site.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sharepoint::config::Settings;
use sharepoint::models::{Drive, DriveItem, GrantSource, ItemKind};
use sharepoint::SharePointClient;

#[derive(Parser)]
#[command(name = "sharepoint-cli")]
#[command(about = "App-only client for SharePoint Online", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Settings file (default: platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Overrides for the settings file
#[derive(Args)]
struct ConnectionArgs {
    #[arg(long, global = true, env = "SHAREPOINT_TENANT_ID")]
    tenant_id: Option<String>,

    #[arg(long, global = true, env = "SHAREPOINT_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, global = true, env = "SHAREPOINT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// SharePoint hostname, e.g. contoso.sharepoint.com
    #[arg(long, global = true, env = "SHAREPOINT_HOSTNAME")]
    hostname: Option<String>,

    /// Server-relative site path, e.g. /sites/Team
    #[arg(long, global = true, env = "SHAREPOINT_SITE_PATH")]
    site_path: Option<String>,

    /// Document library name
    #[arg(long, global = true, env = "SHAREPOINT_DRIVE")]
    drive_name: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "SHAREPOINT_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Send every request to this base URL instead of Microsoft's endpoints
    #[arg(long, global = true, env = "SHAREPOINT_BASE_URL", hide = true)]
    base_url: Option<String>,
}

impl ConnectionArgs {
    fn into_settings(self) -> Settings {
        Settings {
            tenant_id: self.tenant_id,
            client_id: self.client_id,
            client_secret: self.client_secret,
            hostname: self.hostname,
            site_path: self.site_path,
            drive_name: self.drive_name,
            timeout_secs: self.timeout_secs,
            base_url: self.base_url,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the app credentials by acquiring a Graph token
    Auth,

    /// Show the configured site
    Site,

    /// List document libraries of the site
    Drives,

    /// List the children of a folder in the configured library
    Ls {
        /// Folder path from the library root (default: root)
        path: Option<String>,

        /// Folder item ID instead of a path
        #[arg(long, conflicts_with = "path")]
        id: Option<String>,
    },

    /// Show one item of the configured library
    Stat {
        /// Item path from the library root
        #[arg(required_unless_present = "id")]
        path: Option<String>,

        /// Item ID instead of a path
        #[arg(long, conflicts_with = "path")]
        id: Option<String>,
    },

    /// Upload a small local file (4 MiB at most)
    Upload {
        /// Local file to upload
        local: PathBuf,

        /// Destination folder in the library (default: root)
        #[arg(long, default_value = "")]
        to: String,
    },

    /// Download an item to a local path
    Download {
        /// Item ID (from `ls` output)
        item_id: String,

        /// Destination file
        dest: PathBuf,
    },

    /// Show a user's effective permissions on the site
    Permissions {
        /// User email or UPN
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = Settings::load(cli.config.as_deref())?.merge(cli.connection.into_settings());
    let client = SharePointClient::new(settings.to_config()?)?;

    match cli.command {
        Commands::Auth => {
            let token = client.authenticate().await?;
            match token.expires_at() {
                Some(at) => println!(
                    "Authenticated: token for {} valid for {}s",
                    token.scope(),
                    at.saturating_duration_since(std::time::Instant::now()).as_secs()
                ),
                None => println!("Authenticated: token for {}", token.scope()),
            }
        }
        Commands::Site => {
            let site = client
                .get_site(settings.hostname()?, settings.site_path()?)
                .await?;
            println!("Name: {}", site.label());
            println!("ID:   {}", site.id);
            println!("URL:  {}", site.web_url.as_deref().unwrap_or("-"));
        }
        Commands::Drives => {
            let site = client
                .get_site(settings.hostname()?, settings.site_path()?)
                .await?;
            let drives = client.list_drives(&site).await?;
            println!("\nLibraries in {}:", site.label());
            println!("{:-<60}", "");
            if drives.is_empty() {
                println!("  (no libraries found)");
            }
            for drive in &drives {
                println!(
                    "  {:<30} {:<16} {}",
                    drive.name,
                    drive.drive_type.as_deref().unwrap_or("-"),
                    drive.id
                );
            }
        }
        Commands::Ls { path, id } => {
            let drive = open_drive(&client, &settings).await?;
            let items = match (id, path) {
                (Some(id), _) => client.list_items_by_id(&drive, &id).await?,
                (None, Some(path)) => client.list_folder_items(&drive, &path).await?,
                (None, None) => client.list_root_items(&drive).await?,
            };
            print_items(&items);
        }
        Commands::Stat { path, id } => {
            let drive = open_drive(&client, &settings).await?;
            let item = match (id, path) {
                (Some(id), _) => client.get_item_by_id(&drive, &id).await?,
                (None, path) => {
                    client
                        .get_item_by_path(&drive, path.as_deref().unwrap_or_default())
                        .await?
                }
            };
            print_item(&item);
        }
        Commands::Upload { local, to } => {
            let drive = open_drive(&client, &settings).await?;
            let item = client.upload_file(&drive, &to, &local).await?;
            println!("Uploaded {} ({} bytes) as {}", item.path, item.size, item.id);
        }
        Commands::Download { item_id, dest } => {
            let drive = open_drive(&client, &settings).await?;
            let path = client.download_file(&drive, &item_id, &dest).await?;
            println!("Saved {}", path.display());
        }
        Commands::Permissions { email } => {
            let report = client
                .get_user_site_permissions(&email, settings.hostname()?, settings.site_path()?)
                .await?;
            println!(
                "\n{} on {}{}:",
                email, report.hostname, report.site_path
            );
            println!("{:-<60}", "");
            match report.effective.highest() {
                Some(role) => {
                    println!("Highest role: {}", role);
                    println!("All roles:    {}", report.effective.roles().join(", "));
                }
                None => println!("No access"),
            }
            for grant in &report.grants {
                let via = match grant.source {
                    GrantSource::Direct => "direct".to_string(),
                    GrantSource::SharePointGroup { group_id } => format!("SharePoint group {}", group_id),
                    GrantSource::DirectoryGroup { ref group_id } => format!("directory group {}", group_id),
                    GrantSource::DirectoryGroupOwners { ref group_id } => {
                        format!("owners of directory group {}", group_id)
                    }
                    GrantSource::TenantWide => "tenant-wide claim".to_string(),
                };
                println!(
                    "  {:<30} {:<32} {}",
                    grant.principal.label(),
                    via,
                    grant.roles.join(", ")
                );
            }
        }
    }

    Ok(())
}

async fn open_drive(client: &SharePointClient, settings: &Settings) -> Result<Drive> {
    let site = client
        .get_site(settings.hostname()?, settings.site_path()?)
        .await?;
    Ok(client
        .get_drive_by_name(&site, settings.drive_name()?)
        .await?)
}

fn print_items(items: &[DriveItem]) {
    println!("{:-<80}", "");
    if items.is_empty() {
        println!("  (empty)");
    }
    for item in items {
        let (marker, size) = match item.kind {
            ItemKind::Folder { child_count } => ("d", child_count.map(|c| format!("{} items", c))),
            ItemKind::File { .. } => ("-", Some(format!("{} B", item.size))),
        };
        println!(
            "{} {:<40} {:>12} {}",
            marker,
            item.name,
            size.unwrap_or_default(),
            item.id
        );
    }
}

fn print_item(item: &DriveItem) {
    println!("Name:     {}", item.name);
    println!("Path:     {}", item.path);
    println!("ID:       {}", item.id);
    match item.kind {
        ItemKind::Folder { child_count } => {
            println!("Kind:     folder");
            if let Some(count) = child_count {
                println!("Children: {}", count);
            }
        }
        ItemKind::File { ref mime_type } => {
            println!("Kind:     file ({})", mime_type.as_deref().unwrap_or("unknown type"));
            println!("Size:     {} bytes", item.size);
        }
    }
    if let Some(ref modified) = item.last_modified {
        println!("Modified: {}", modified.to_rfc3339());
    }
    if let Some(ref url) = item.web_url {
        println!("URL:      {}", url);
    }
}
