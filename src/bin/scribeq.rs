//! scribeq CLI — work distribution server for mass transcription jobs.

use clap::{Parser, Subcommand};
use scribeq::artifact::FsArtifactStore;
use scribeq::config::Config;
use scribeq::dispatch::Dispatcher;
use scribeq::lease::LeaseManager;
use scribeq::model::{Status, WorkId};
use scribeq::store::{Db, WorkStore};
use scribeq::telemetry::init_logging;
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "scribeq", about = "Work distribution server for mass transcription jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the dispatcher HTTP server
    Serve {
        /// Host address to listen on
        #[arg(short = 'l', long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 6000)]
        port: u16,
    },
    /// Work item operations
    Work {
        #[command(subcommand)]
        action: WorkAction,
    },
}

#[derive(Subcommand)]
enum WorkAction {
    /// Add a new work item (normally done by the feed harvester)
    Add {
        /// Author/publisher group key
        group_key: String,
        /// Language tag
        language: String,
        /// URL of the original episode audio
        #[arg(long)]
        source_locator: String,
        /// Path of the cached episode audio
        #[arg(long)]
        cache_locator: String,
    },
    /// List work items
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
        /// Filter by language
        #[arg(long)]
        language: Option<String>,
        /// Maximum items to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a work item
    Show {
        /// Work item ID (full UUID or prefix)
        id: String,
    },
    /// Cancel in-progress items whose lease is older than the threshold
    Reclaim {
        /// Idle threshold in minutes
        #[arg(long)]
        idle_mins: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    init_logging(&config.log_level)?;

    match cli.command {
        Command::Serve { host, port } => cmd_serve(&config, host, port).await,
        Command::Work { action } => {
            let db = Db::connect(config.database_url.expose_secret()).await?;
            db.migrate().await?;
            let store: Arc<dyn WorkStore> = Arc::new(db);

            match action {
                WorkAction::Add {
                    group_key,
                    language,
                    source_locator,
                    cache_locator,
                } => cmd_work_add(&*store, group_key, language, source_locator, cache_locator).await,
                WorkAction::List {
                    status,
                    language,
                    limit,
                } => cmd_work_list(&*store, status, language, limit).await,
                WorkAction::Show { id } => cmd_work_show(&*store, id).await,
                WorkAction::Reclaim { idle_mins } => cmd_work_reclaim(store, idle_mins).await,
            }
        }
    }
}

async fn cmd_serve(config: &Config, host: String, port: u16) -> anyhow::Result<()> {
    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    db.health_check().await?;

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(db),
        Arc::new(FsArtifactStore::new(config.artifact_dir.clone())),
        config.api_credential.clone(),
    ));

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    scribeq::api::serve(addr, dispatcher).await?;
    Ok(())
}

async fn cmd_work_add(
    store: &dyn WorkStore,
    group_key: String,
    language: String,
    source_locator: String,
    cache_locator: String,
) -> anyhow::Result<()> {
    let new = scribeq::model::NewWorkItem::new(group_key, language)
        .source_locator(source_locator)
        .cache_locator(cache_locator);
    let item = store.insert(new).await?;
    println!("Created: {} (status: {})", item.id, item.status);
    Ok(())
}

async fn cmd_work_list(
    store: &dyn WorkStore,
    status: Option<String>,
    language: Option<String>,
    limit: i64,
) -> anyhow::Result<()> {
    let status_filter: Option<Status> = match status {
        Some(s) => Some(
            s.parse()
                .map_err(|_| anyhow::anyhow!("invalid status: {s}"))?,
        ),
        None => None,
    };

    let items = store
        .list(status_filter, language.as_deref(), limit)
        .await?;

    if items.is_empty() {
        println!("No work items found.");
        return Ok(());
    }

    // Header
    println!(
        "{:<8}  {:<12}  {:<4}  {:<30}  CREATED",
        "ID", "STATUS", "LANG", "GROUP"
    );
    println!("{}", "-".repeat(80));

    for item in &items {
        let short_id = &item.id.to_string()[..8];
        let group = if item.group_key.len() > 30 {
            &item.group_key[..30]
        } else {
            &item.group_key
        };
        println!(
            "{:<8}  {:<12}  {:<4}  {:<30}  {}",
            short_id,
            item.status.to_string(),
            item.language,
            group,
            item.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\n{} item(s)", items.len());
    Ok(())
}

async fn cmd_work_show(store: &dyn WorkStore, id_str: String) -> anyhow::Result<()> {
    // Support prefix matching — find the work item whose ID starts with the given string
    let id = if id_str.len() < 36 {
        let items = store.list(None, None, 100).await?;
        let matches: Vec<_> = items
            .iter()
            .filter(|item| item.id.to_string().starts_with(&id_str))
            .collect();
        match matches.len() {
            0 => anyhow::bail!("no work item matching prefix '{id_str}'"),
            1 => matches[0].id,
            n => anyhow::bail!("{n} work items match prefix '{id_str}' — be more specific"),
        }
    } else {
        WorkId(uuid::Uuid::parse_str(&id_str)?)
    };

    let item = store.get(id).await?;

    println!("ID:             {}", item.id);
    println!("Status:         {}", item.status);
    println!("Language:       {}", item.language);
    println!("Group:          {}", item.group_key);
    println!("Source:         {}", item.source_locator);
    println!("Cache:          {}", item.cache_locator);
    println!(
        "Result:         {}",
        item.result_locator.as_deref().unwrap_or("-")
    );
    if let Some(claimed) = item.claimed_at {
        println!("Claimed:        {claimed}");
    }
    println!("Created:        {}", item.created_at);
    println!("Updated:        {}", item.updated_at);

    Ok(())
}

async fn cmd_work_reclaim(store: Arc<dyn WorkStore>, idle_mins: i64) -> anyhow::Result<()> {
    if idle_mins < 0 {
        anyhow::bail!("idle threshold must be non-negative");
    }
    let leases = LeaseManager::new(store);
    let reclaimed = leases
        .reclaim_stale(chrono::Duration::minutes(idle_mins))
        .await?;

    if reclaimed.is_empty() {
        println!("No stale leases.");
    } else {
        for id in &reclaimed {
            println!("Reclaimed: {id}");
        }
        println!("\n{} lease(s) reclaimed", reclaimed.len());
    }
    Ok(())
}
