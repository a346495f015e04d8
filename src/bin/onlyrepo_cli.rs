//! OnlyRepo CLI - file manager client
//!
//! Usage:
//!   onlyrepo-cli ls [--folder ID] [--search Q] [--trash]   List a folder, the trash or search results
//!   onlyrepo-cli upload <paths..> [--folder ID]            Upload files
//!   onlyrepo-cli trash|restore|delete <file|folder> <id>   Trash, restore or permanently delete
//!   onlyrepo-cli share <file|folder> <id> [--role editor]  Create a share link
//!   onlyrepo-cli usage                                     Show storage usage

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;

use onlyrepo::config::{
    get_config_path, load_client_config, save_client_config, validate_config, ClientConfig,
};
use onlyrepo::gateway::{
    FileUpload, ResourceEntry, ResourceKind, ShareRole, SortField, SortOrder, UsageLevel,
};
use onlyrepo::{
    init_tracing, ClientError, FetchOutcome, HttpGateway, ListController, MediaType, MutationKind,
    TokenSession,
};

#[derive(Parser)]
#[command(
    name = "onlyrepo-cli",
    about = "OnlyRepo CLI - browse and manage a remote file store",
    version,
    long_about = "Talks to the OnlyRepo file-manager API.\nThe bearer token comes from --token or ONLYREPO_TOKEN."
)]
struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = "ONLYREPO_API_URL")]
    api_url: Option<String>,

    /// Bearer token of an existing session
    #[arg(long, global = true, env = "ONLYREPO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EntryKind {
    File,
    Folder,
}

impl From<EntryKind> for ResourceKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::File => ResourceKind::File,
            EntryKind::Folder => ResourceKind::Folder,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Size,
    Date,
}

impl From<SortArg> for SortField {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Name => SortField::Name,
            SortArg::Size => SortField::Size,
            SortArg::Date => SortField::Date,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => SortOrder::Asc,
            OrderArg::Desc => SortOrder::Desc,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Viewer,
    Editor,
}

impl From<RoleArg> for ShareRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Viewer => ShareRole::Viewer,
            RoleArg::Editor => ShareRole::Editor,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List a folder, the trash or search results
    Ls {
        /// Folder id (default: root)
        #[arg(long)]
        folder: Option<String>,
        /// Search term; takes precedence over --trash
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value = "name")]
        sort: SortArg,
        #[arg(long, value_enum, default_value = "asc")]
        order: OrderArg,
        /// List the trash instead of a folder
        #[arg(long)]
        trash: bool,
        /// Local filter: all, image, document, video, other
        #[arg(long, default_value = "all")]
        media: MediaType,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Move an entry to the trash
    Trash { kind: EntryKind, id: String },
    /// Restore an entry from the trash
    Restore { kind: EntryKind, id: String },
    /// Permanently delete an entry
    Delete { kind: EntryKind, id: String },
    /// Create a folder
    Mkdir {
        name: String,
        /// Parent folder id (default: root)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Upload local files
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Target folder id (default: root)
        #[arg(long)]
        folder: Option<String>,
    },
    /// Upload a new version of an existing file
    NewVersion { file_id: String, path: PathBuf },
    /// List the stored versions of a file
    Versions { file_id: String },
    /// Download a stored version
    DownloadVersion { version_id: String, dest: PathBuf },
    /// Create a share link
    Share {
        kind: EntryKind,
        id: String,
        #[arg(long, value_enum, default_value = "viewer")]
        role: RoleArg,
    },
    /// Resolve a share link id
    OpenShare { share_id: String },
    /// Show storage usage
    Usage,
    /// Show the breadcrumb trail of a folder
    Where { folder: String },
    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn effective_config(api_url: Option<&str>) -> anyhow::Result<ClientConfig> {
    let mut config = load_client_config();
    if let Some(url) = api_url {
        config.api_url = url.trim().to_string();
    }
    validate_config(&config)?;
    Ok(config)
}

fn build_controller(api_url: Option<&str>, token: Option<String>) -> anyhow::Result<ListController> {
    let config = effective_config(api_url)?;
    let gateway = Arc::new(HttpGateway::new(&config)?);
    let token = token.filter(|t| !t.trim().is_empty()).map(SecretString::from);
    let session = Arc::new(TokenSession::new(token));
    Ok(ListController::new(gateway, session, &config))
}

/// Format an RFC 3339 timestamp for the table, raw value when unparseable
fn short_date(raw: Option<&str>) -> String {
    match raw {
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => "-".to_string(),
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn print_entry(entry: &ResourceEntry) {
    match entry {
        ResourceEntry::Folder(f) => println!(
            "{:<7} {:<36} {:>10} {:<16} {}/",
            "folder",
            f.id,
            "-",
            short_date(f.created_at.as_deref()),
            f.name
        ),
        ResourceEntry::File(f) => println!(
            "{:<7} {:<36} {:>10} {:<16} {}",
            "file",
            f.id,
            human_size(f.size),
            short_date(f.created_at.as_deref()),
            f.name
        ),
    }
}

fn progress_style() -> anyhow::Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("=>-"))
}

fn mutation(kind: EntryKind, file: MutationKind, folder: MutationKind) -> MutationKind {
    match kind {
        EntryKind::File => file,
        EntryKind::Folder => folder,
    }
}

fn run_config(action: ConfigAction, api_url: Option<&str>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = effective_config(api_url)?;
            println!("# {}", get_config_path().display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Init { force } => {
            let path = get_config_path();
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            save_client_config(&ClientConfig::default())?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let api_url = cli.api_url.as_deref();
    let command = match cli.command {
        Commands::Config { action } => return run_config(action, api_url),
        command => command,
    };
    let controller = build_controller(api_url, cli.token)?;

    match command {
        Commands::Ls {
            folder,
            search,
            sort,
            order,
            trash,
            media,
            pages,
            json,
        } => {
            controller.set_folder(folder.as_deref()).await;
            controller.set_search_term(search.as_deref().unwrap_or("")).await;
            controller.set_sort(sort.into()).await;
            controller.set_order(order.into()).await;
            controller.set_viewing_trash(trash).await;
            controller.set_media_type(media).await;

            if controller.fetch_page().await? == FetchOutcome::Skipped {
                return Err(ClientError::AuthMissing.into());
            }
            for _ in 1..pages {
                if controller.load_more().await? == FetchOutcome::NothingToLoad {
                    break;
                }
            }

            let entries = controller.visible_entries().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    print_entry(entry);
                }
                let cursor = controller.cursor().await;
                println!();
                println!(
                    "{} entries from {}, page {}{}",
                    entries.len(),
                    controller.gateway_name(),
                    cursor.page,
                    if cursor.has_more { " (more available)" } else { "" }
                );
            }
        }
        Commands::Trash { kind, id } => {
            let kind = mutation(kind, MutationKind::TrashFile, MutationKind::TrashFolder);
            controller.apply_mutation(kind, &id).await?;
            println!("{} {}", id, kind.describe());
        }
        Commands::Restore { kind, id } => {
            let kind = mutation(kind, MutationKind::RestoreFile, MutationKind::RestoreFolder);
            controller.set_viewing_trash(true).await;
            controller.apply_mutation(kind, &id).await?;
            println!("{} {}", id, kind.describe());
        }
        Commands::Delete { kind, id } => {
            let kind = mutation(kind, MutationKind::DeleteFile, MutationKind::DeleteFolder);
            controller.set_viewing_trash(true).await;
            controller.apply_mutation(kind, &id).await?;
            println!("{} {}", id, kind.describe());
        }
        Commands::Mkdir { name, parent } => {
            controller.set_folder(parent.as_deref()).await;
            let created = controller.create_folder(&name).await?;
            println!("Created folder {} ({})", created.name, created.id);
        }
        Commands::Upload { paths, folder } => {
            controller.set_folder(folder.as_deref()).await;

            let pb = ProgressBar::new(paths.len() as u64);
            pb.set_style(progress_style()?);

            let mut failed = 0;
            for path in &paths {
                pb.set_message(path.display().to_string());
                let upload = FileUpload::from_path(path)
                    .await
                    .with_context(|| format!("Cannot read {}", path.display()))?;
                let report = controller.upload(vec![upload]).await?;
                for (name, e) in &report.failed {
                    failed += 1;
                    pb.suspend(|| eprintln!("  x {} ({})", name, e));
                }
                pb.inc(1);
            }
            pb.finish_with_message("done");

            if failed > 0 {
                bail!("{} of {} uploads failed", failed, paths.len());
            }
        }
        Commands::NewVersion { file_id, path } => {
            let upload = FileUpload::from_path(&path)
                .await
                .with_context(|| format!("Cannot read {}", path.display()))?;
            controller.upload_new_version(&file_id, &upload).await?;
            println!("Uploaded new version of {}", file_id);
        }
        Commands::Versions { file_id } => {
            let versions = controller.versions(&file_id).await?;
            if versions.is_empty() {
                println!("No stored versions");
            }
            for v in versions {
                println!(
                    "{:<36} {:>10} {:<16} {}",
                    v.id,
                    human_size(v.size),
                    short_date(v.created_at.as_deref()),
                    v.name.as_deref().unwrap_or("")
                );
            }
        }
        Commands::DownloadVersion { version_id, dest } => {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")?
                    .progress_chars("=>-"),
            );
            let bar = pb.clone();
            let on_progress: Box<dyn Fn(u64, u64) + Send> = Box::new(move |done, total| {
                bar.set_length(total);
                bar.set_position(done);
            });

            let written = controller
                .download_version(&version_id, &dest, Some(on_progress))
                .await?;
            pb.finish_and_clear();
            println!("Saved {} to {}", human_size(written), dest.display());
        }
        Commands::Share { kind, id, role } => {
            let link = controller
                .create_share_link(&id, kind.into(), role.into())
                .await?;
            println!("{}", link);
        }
        Commands::OpenShare { share_id } => {
            let shared = controller.open_share(&share_id).await?;
            println!(
                "{} {} ({:?})",
                shared.resource_type,
                shared.resource.name.as_deref().unwrap_or("<unnamed>"),
                shared.role
            );
            if let Some(url) = shared.download_url() {
                println!("{}", url);
            }
        }
        Commands::Usage => match controller.storage_usage().await {
            Some(usage) => {
                let marker = match usage.level() {
                    UsageLevel::Normal => "",
                    UsageLevel::High => " (high)",
                    UsageLevel::Critical => " (critical)",
                };
                println!(
                    "{:.1} MB of {:.1} MB used, {:.0}%{}",
                    usage.used_mb(),
                    usage.max_mb(),
                    usage.percent,
                    marker
                );
            }
            None => bail!("Storage usage unavailable"),
        },
        Commands::Where { folder } => {
            controller.set_folder(Some(&folder)).await;
            let location = controller.location().await?;
            let trail: Vec<&str> = location.trail.iter().map(|c| c.name.as_str()).collect();
            if trail.is_empty() {
                println!("{}", location.current.map(|f| f.name).unwrap_or_default());
            } else {
                println!("{}", trail.join(" / "));
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        if e
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::requires_login)
        {
            eprintln!("Sign in again and pass the token with --token or ONLYREPO_TOKEN.");
        }
        std::process::exit(1);
    }
}
