//! Chatsift CLI - import, search and moderate indexed group chats

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chatsift_core::config::Config;
use chatsift_core::domain::chat::{ChatKind, ToggleOutcome};
use chatsift_core::domain::format::{Card, SearchResponse};
use chatsift_core::domain::membership::PeerProfile;
use chatsift_core::domain::moderation::{DeleteRequest, StaticPrivileges};
use chatsift_core::engine::{Engine, IngestOutcome};
use chatsift_core::events::{ChatRef, IncomingMessage};
use chatsift_core::import;
use chatsift_core::storage::{Database, DatabaseConfig};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "chatsift")]
#[command(author, version, about = "Scoped message index and search for group chats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the configured path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a Telegram Desktop chat export (result.json)
    Import {
        /// Export file
        file: PathBuf,
    },

    /// Manage tracked chats
    Chats {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Ingest a single message
    Post {
        /// Chat id
        #[arg(long)]
        chat: i64,
        /// Sender peer id
        #[arg(long)]
        from: i64,
        /// Message id within the chat
        #[arg(long)]
        msg_id: i64,
        /// Sender display name
        #[arg(long, default_value = "")]
        name: String,
        /// Sender username
        #[arg(long)]
        username: Option<String>,
        /// Send time in unix seconds (defaults to now)
        #[arg(long)]
        date: Option<i64>,
        /// Edit time in unix seconds, marks the message as an edit
        #[arg(long)]
        edit_date: Option<i64>,
        /// Message text
        text: String,
    },

    /// Search on behalf of a peer
    Search {
        /// Requesting peer id
        #[arg(long = "as")]
        requester: i64,
        /// Query line: [@user|@id] [terms...] [page]
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },

    /// Remove a message from search via its link
    Delete {
        /// Requesting peer id
        #[arg(long = "as")]
        requester: i64,
        /// Chat the command is issued in
        #[arg(long)]
        chat: i64,
        /// Peer ids to treat as chat admins
        #[arg(long = "admin")]
        admins: Vec<i64>,
        /// Message link
        link: String,
    },

    /// Manage chat membership
    Members {
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ChatAction {
    /// Enable indexing and search for a chat
    Enable {
        id: i64,
        #[arg(short, long, default_value = "")]
        title: String,
    },
    /// Disable indexing and search for a chat
    Disable { id: i64 },
    /// Show one chat, or all tracked chats
    Show { id: Option<i64> },
}

#[derive(Subcommand)]
enum MemberAction {
    /// Record a peer as member of a chat
    Add {
        #[arg(long)]
        chat: i64,
        #[arg(long)]
        peer: i64,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// Remove a peer from a chat
    Remove {
        #[arg(long)]
        chat: i64,
        #[arg(long)]
        peer: i64,
    },
    /// List members of a chat
    List {
        #[arg(long)]
        chat: i64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Show config file path
    Path,
}

/// Shared state for commands that touch the store
struct Session {
    config: Config,
    format: OutputFormat,
    quiet: bool,
}

impl Session {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.database.path.clone())
    }

    async fn engine(&self, database: Option<&Path>, privileges: StaticPrivileges) -> anyhow::Result<Engine> {
        let path = self.database_path(database);
        let db = Database::open(&path)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Engine::new(&self.config, db, Arc::new(privileges))?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chatsift=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Config commands must work even when the stored config does not validate.
    let command = match cli.command {
        Commands::Config { action } => return cmd_config(action, cli.quiet),
        command => command,
    };

    let config = Config::load().context("Failed to load configuration")?;
    config.validate()?;
    let ctx = Session {
        config,
        format: cli.format,
        quiet: cli.quiet,
    };
    let database = cli.database.as_deref();

    match command {
        Commands::Import { file } => cmd_import(&ctx, database, &file).await,

        Commands::Chats { action } => cmd_chats(&ctx, database, action).await,

        Commands::Post {
            chat,
            from,
            msg_id,
            name,
            username,
            date,
            edit_date,
            text,
        } => {
            let mut sender = PeerProfile::new(from, name);
            sender.username = username;
            let date = date.unwrap_or_else(|| chrono::Utc::now().timestamp());
            cmd_post(&ctx, database, chat, sender, msg_id, date, edit_date, text).await
        }

        Commands::Search { requester, query } => {
            cmd_search(&ctx, database, requester, &query.join(" ")).await
        }

        Commands::Delete {
            requester,
            chat,
            admins,
            link,
        } => cmd_delete(&ctx, database, requester, chat, &admins, &link).await,

        Commands::Members { action } => cmd_members(&ctx, database, action).await,

        Commands::Doctor => cmd_doctor(&ctx, database).await,

        Commands::Config { .. } => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_import(ctx: &Session, database: Option<&Path>, file: &Path) -> anyhow::Result<()> {
    let path = ctx.database_path(database);
    if !ctx.quiet && !ctx.json() {
        println!("Importing {} into {}...", file.display(), path.display());
    }

    let db = Database::new(DatabaseConfig::with_path(&path).bulk_import())
        .await
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    let summary = import::import_file(&db, file)
        .await
        .with_context(|| format!("Failed to import {}", file.display()))?;
    db.close().await;

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !ctx.quiet {
        println!(
            "Imported {} messages from '{}' ({}), {} skipped, {} peers in {:.1}s",
            summary.imported,
            summary.chat_name,
            summary.chat_id,
            summary.skipped,
            summary.peers,
            summary.elapsed.as_secs_f64()
        );
    }
    Ok(())
}

async fn cmd_chats(ctx: &Session, database: Option<&Path>, action: ChatAction) -> anyhow::Result<()> {
    let engine = ctx.engine(database, StaticPrivileges::new()).await?;
    let chats = engine.chats();

    match action {
        ChatAction::Enable { id, title } => {
            let outcome = chats.set_enabled(id, &title, true).await?;
            print_toggle(ctx, id, true, outcome);
        }
        ChatAction::Disable { id } => {
            let title = chats.get(id).await?.map(|c| c.title).unwrap_or_default();
            let outcome = chats.set_enabled(id, &title, false).await?;
            print_toggle(ctx, id, false, outcome);
        }
        ChatAction::Show { id: Some(id) } => match chats.get(id).await? {
            Some(chat) if ctx.json() => println!("{}", serde_json::to_string_pretty(&chat)?),
            Some(chat) => {
                println!("Chat: {}", chat.title);
                println!("  ID: {}", chat.id);
                println!("  Enabled: {}", chat.enabled);
                println!("  Members: {}", engine.registry().members_of(id).await?.len());
            }
            None => {
                return Err(chatsift_core::Error::ChatNotFound(id).into());
            }
        },
        ChatAction::Show { id: None } => {
            let all = chats.list().await?;
            if ctx.json() {
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else if all.is_empty() {
                if !ctx.quiet {
                    println!("No chats tracked.");
                    println!("\nEnable one with: chatsift chats enable <id> --title <title>");
                }
            } else {
                for chat in all {
                    let state = if chat.enabled { "" } else { " [disabled]" };
                    println!("  {} - {}{}", chat.id, chat.title, state);
                }
            }
        }
    }
    Ok(())
}

fn print_toggle(ctx: &Session, id: i64, enabled: bool, outcome: ToggleOutcome) {
    if ctx.json() {
        println!(
            "{}",
            json!({ "chat_id": id, "enabled": enabled, "changed": outcome != ToggleOutcome::Unchanged })
        );
        return;
    }
    if ctx.quiet {
        return;
    }
    let state = if enabled { "enabled" } else { "disabled" };
    match outcome {
        ToggleOutcome::Unchanged => println!("Chat {} is already {}.", id, state),
        ToggleOutcome::Created | ToggleOutcome::Changed => println!("Chat {} {}.", id, state),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_post(
    ctx: &Session,
    database: Option<&Path>,
    chat_id: i64,
    sender: PeerProfile,
    msg_id: i64,
    date: i64,
    edit_date: Option<i64>,
    text: String,
) -> anyhow::Result<()> {
    let engine = ctx.engine(database, StaticPrivileges::new()).await?;
    let title = engine
        .chats()
        .get(chat_id)
        .await?
        .map(|c| c.title)
        .unwrap_or_default();

    let mut message = IncomingMessage::new(
        ChatRef::new(chat_id, ChatKind::Supergroup, title),
        sender,
        msg_id,
        text,
        date,
    );
    message.edit_date = edit_date;

    let outcome = engine.ingest(&message).await?;
    if ctx.json() {
        println!("{}", serde_json::to_string(&outcome)?);
    } else if !ctx.quiet {
        match outcome {
            IngestOutcome::Stored => println!("Message {} stored.", msg_id),
            IngestOutcome::EditIgnored => println!("Edit ignored: outside the edit window."),
            IngestOutcome::Skipped(reason) => {
                warn!(?reason, "Message not indexed");
                println!("Message skipped: {:?}", reason);
            }
        }
    }
    Ok(())
}

async fn cmd_search(
    ctx: &Session,
    database: Option<&Path>,
    requester: i64,
    query: &str,
) -> anyhow::Result<()> {
    let engine = ctx.engine(database, StaticPrivileges::new()).await?;
    let response = engine.search(requester, query).await?;

    if ctx.json() {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response, ctx.quiet);
    }
    Ok(())
}

fn print_response(response: &SearchResponse, quiet: bool) {
    for card in &response.cards {
        match card {
            Card::Sticker { .. } => {
                println!("Unauthorized: not a member of any enabled chat.");
            }
            Card::Info { title, description, .. } => {
                println!("{}", title);
                if let Some(description) = description {
                    if !quiet {
                        println!("  {}", description);
                    }
                }
            }
            Card::Hit {
                id,
                title,
                description,
                ..
            } => {
                println!("[{}] {}", id, title);
                if !quiet {
                    println!("    {}", description);
                }
            }
        }
    }
}

async fn cmd_delete(
    ctx: &Session,
    database: Option<&Path>,
    requester: i64,
    chat_id: i64,
    admins: &[i64],
    link: &str,
) -> anyhow::Result<()> {
    let privileges = admins
        .iter()
        .fold(StaticPrivileges::new(), |acc, admin| acc.with_admin(chat_id, *admin));
    let engine = ctx.engine(database, privileges).await?;

    let request = DeleteRequest {
        chat_id,
        chat_kind: ChatKind::Supergroup,
        requester,
        text: link.to_string(),
    };
    let outcome = engine.delete(&request).await?;
    info!(chat_id, requester, ?outcome, "Delete request handled");

    if ctx.json() {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        match outcome.reply_text() {
            Some(text) => println!("{}", text),
            None if !ctx.quiet => println!("Ignored: {:?}", outcome),
            None => {}
        }
    }
    Ok(())
}

async fn cmd_members(ctx: &Session, database: Option<&Path>, action: MemberAction) -> anyhow::Result<()> {
    let engine = ctx.engine(database, StaticPrivileges::new()).await?;
    let registry = engine.registry();

    match action {
        MemberAction::Add {
            chat,
            peer,
            name,
            username,
        } => {
            if engine.chats().get(chat).await?.is_none() {
                return Err(chatsift_core::Error::ChatNotFound(chat).into());
            }
            let mut profile = PeerProfile::new(peer, name);
            profile.username = username;
            registry.observe(&profile).await?;
            let added = registry.record_join_or_post(chat, peer).await?;
            if !ctx.quiet {
                if added {
                    println!("Peer {} added to chat {}.", peer, chat);
                } else {
                    println!("Peer {} is already a member of chat {}.", peer, chat);
                }
            }
        }
        MemberAction::Remove { chat, peer } => {
            let removed = registry.record_leave(chat, peer).await?;
            if !ctx.quiet {
                if removed {
                    println!("Peer {} removed from chat {}.", peer, chat);
                } else {
                    println!("Peer {} was not a member of chat {}.", peer, chat);
                }
            }
        }
        MemberAction::List { chat } => {
            let members = registry.members_of(chat).await?;
            if ctx.json() {
                println!("{}", serde_json::to_string_pretty(&members)?);
            } else if members.is_empty() {
                if !ctx.quiet {
                    println!("No members recorded for chat {}.", chat);
                }
            } else {
                for peer in members {
                    if peer.username.is_empty() {
                        println!("  {} - {}", peer.id, peer.full_name);
                    } else {
                        println!("  {} - {} (@{})", peer.id, peer.full_name, peer.username);
                    }
                }
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(ctx: &Session, database: Option<&Path>) -> anyhow::Result<()> {
    let quiet = ctx.quiet;
    if !quiet {
        println!("Chatsift Health Check");
        println!("=====================");
        println!();
    }

    let mut all_ok = true;

    match ctx.config.format.tz() {
        Ok(tz) => {
            if !quiet {
                println!("[OK] Time zone: {}", tz);
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Time zone: {}", e);
            }
        }
    }

    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: {}", e),
        }
    }

    let path = ctx.database_path(database);
    match Database::open(&path).await {
        Ok(db) => {
            match db.health_check().await {
                Ok(()) => {
                    if !quiet {
                        println!("[OK] Database: {}", path.display());
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Database: {}", e);
                    }
                }
            }

            let status = db.migration_status().await?;
            if !quiet {
                let marker = if status.needs_migration { "!!" } else { "OK" };
                println!(
                    "[{}] Schema: version {} of {}",
                    marker, status.current_version, status.target_version
                );
            }
            all_ok &= !status.needs_migration;

            let engine = Engine::new(&ctx.config, db, Arc::new(StaticPrivileges::new()))?;
            let messages = engine.store().count().await?;
            let chats = engine.chats().list().await?;
            if !quiet {
                println!(
                    "[OK] Index: {} messages across {} chats ({} enabled)",
                    messages,
                    chats.len(),
                    chats.iter().filter(|c| c.enabled).count()
                );
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Database: {}", e);
            }
        }
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed.");
        } else {
            println!("Some checks failed.");
        }
    }

    if all_ok {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Health check failed"))
    }
}

#[cfg(test)]
mod main_tests;
