mod config;
mod error;
mod memory;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{ConfigManager, RankerKind, RecallConfig};
use dialoguer::Confirm;
use memory::{ConversationStore, EmbeddingRanker, NoopRanker, Ranker, Role};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

// ============================================================================
// CLI Argument Parsing
// ============================================================================

#[derive(Parser)]
#[command(name = "recall", version, about = "Recall - conversational memory for a local AI assistant")]
struct Cli {
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new conversation session
    NewSession {
        /// Session title (defaults to a placeholder)
        title: Option<String>,
    },
    /// Append a message to a session
    Add {
        /// Session id (auto-created if unknown)
        session: String,
        /// The message text
        content: String,
        /// Speaker role (user, assistant, system, or any custom tag)
        #[arg(short, long, default_value = "user")]
        role: String,
    },
    /// Search stored messages by semantic similarity
    Search {
        /// The query text
        query: String,
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
        /// Restrict the search to one session
        #[arg(long)]
        session: Option<String>,
    },
    /// List all sessions
    Sessions,
    /// Show the most recent messages of a session
    Messages {
        /// Session id
        session: String,
        /// Maximum number of messages
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Wipe all sessions and messages
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Show store statistics
    Stats,
    /// Show system info (version, platform, storage path)
    Info,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the current configuration
    Show,
    /// Set a config value (storage-path, ranker, search-limit, history-limit, embedding-dim)
    Set {
        /// Key to set
        key: String,
        /// Value to set
        value: String,
    },
    /// Print the config file path
    Path,
}

/// JSON envelope for non-interactive output
fn json_output(success: bool, data: serde_json::Value, error: Option<&str>) -> String {
    serde_json::json!({
        "success": success,
        "data": data,
        "error": error,
    })
    .to_string()
}

fn main() -> Result<()> {
    // Check for --json flag before initializing logging
    let json_mode = std::env::args().any(|arg| arg == "--json");

    // Initialize structured logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("recall=info"));

    if json_mode {
        // In JSON mode: send logs to stderr with no ANSI colors
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    } else if std::env::var("RECALL_LOG_JSON").is_ok() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }

    let cli = Cli::parse();

    if let Some(command) = cli.command {
        return run_command(command, cli.json);
    }

    run_repl()
}

/// Build the store from config; this is the one place the ranker gets chosen
fn open_store(config: &RecallConfig) -> Result<ConversationStore> {
    let ranker: Box<dyn Ranker> = match config.ranker {
        RankerKind::Embedding => Box::new(EmbeddingRanker::new(config.embedding_dim)),
        RankerKind::None => Box::new(NoopRanker),
    };
    let store = ConversationStore::new(config.resolve_storage_path()?, ranker)?;
    Ok(store)
}

// ============================================================================
// Non-Interactive Command Runner
// ============================================================================

fn run_command(command: Commands, json_mode: bool) -> Result<()> {
    let config = ConfigManager::load()?;

    match command {
        Commands::NewSession { title } => {
            let mut store = open_store(&config)?;
            let id = store.create_session(title.as_deref());
            if json_mode {
                println!("{}", json_output(true, serde_json::json!({ "session_id": id }), None));
            } else {
                println!("Created session {}", id);
            }
        }
        Commands::Add { session, content, role } => {
            let mut store = open_store(&config)?;
            let id = store.add_message(&session, Role::from(role), &content);
            if json_mode {
                println!("{}", json_output(true, serde_json::json!({ "message_id": id }), None));
            } else {
                println!("Stored message {}", id);
            }
        }
        Commands::Search { query, limit, session } => {
            let store = open_store(&config)?;
            let limit = limit.unwrap_or(config.search_limit);
            let hits = store.search_scoped(&query, limit, session.as_deref());
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&hits)?, None));
            } else if hits.is_empty() {
                println!("No results.");
            } else {
                for hit in &hits {
                    println!("[{:.3}] ({}, {}) {}", hit.score, hit.role, hit.session_id, hit.content);
                }
            }
        }
        Commands::Sessions => {
            let store = open_store(&config)?;
            let sessions = store.get_all_sessions();
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&sessions)?, None));
            } else if sessions.is_empty() {
                println!("No sessions.");
            } else {
                for session in &sessions {
                    println!(
                        "{}  {:<30} {} messages  (created {})",
                        session.id, session.title, session.message_count, session.created_at
                    );
                }
            }
        }
        Commands::Messages { session, limit } => {
            let store = open_store(&config)?;
            let limit = limit.unwrap_or(config.history_limit);
            let messages = store.get_session_messages(&session, limit);
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(&messages)?, None));
            } else if messages.is_empty() {
                println!("No messages for session {}", session);
            } else {
                if let Some(info) = store.get_session(&session) {
                    println!("Session {} ({} messages total)", info.title, info.message_count);
                }
                for message in &messages {
                    println!("[{}] {}: {}", message.timestamp, message.role, message.content);
                }
            }
        }
        Commands::Clear { force } => {
            if !force && !json_mode {
                let confirmed = Confirm::new()
                    .with_prompt("Wipe all stored conversations?")
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let mut store = open_store(&config)?;
            let ok = store.clear_memory();
            if json_mode {
                println!("{}", json_output(ok, serde_json::json!({ "cleared": ok }), None));
            } else if ok {
                println!("Memory cleared.");
            } else {
                eprintln!("Failed to persist cleared state; in-memory store was emptied.");
                std::process::exit(1);
            }
        }
        Commands::Stats => {
            let store = open_store(&config)?;
            let stats = store.stats();
            if json_mode {
                println!("{}", json_output(true, serde_json::json!({
                    "sessions": stats.sessions,
                    "messages": stats.messages,
                    "size_bytes": stats.size_bytes,
                    "storage_path": stats.storage_path.to_string_lossy(),
                }), None));
            } else {
                println!("Memory statistics");
                println!("  Sessions: {}", stats.sessions);
                println!("  Messages: {}", stats.messages);
                println!("  Size on disk: {} bytes", stats.size_bytes);
                println!("  Storage: {}", stats.storage_path.display());
            }
        }
        Commands::Info => {
            let version = env!("CARGO_PKG_VERSION");
            let platform = std::env::consts::OS;
            let storage = config.resolve_storage_path()?;
            if json_mode {
                println!("{}", json_output(true, serde_json::json!({
                    "version": version,
                    "platform": platform,
                    "name": "recall",
                    "storage_path": storage.to_string_lossy(),
                }), None));
            } else {
                println!("Recall v{}", version);
                println!("Platform: {}", platform);
                println!("Storage: {}", storage.display());
            }
        }
        Commands::Config { action } => {
            run_config_command(action, json_mode)?;
        }
    }

    Ok(())
}

fn run_config_command(action: ConfigAction, json_mode: bool) -> Result<()> {
    let mut manager = ConfigManager::new()?;

    match action {
        ConfigAction::Show => {
            if json_mode {
                println!("{}", json_output(true, serde_json::to_value(manager.get())?, None));
            } else {
                println!("{}", toml::to_string_pretty(manager.get())?);
            }
        }
        ConfigAction::Set { key, value } => {
            let cfg = manager.get_mut();
            match key.as_str() {
                "storage-path" => cfg.storage_path = Some(PathBuf::from(&value)),
                "ranker" => {
                    cfg.ranker = match value.as_str() {
                        "embedding" => RankerKind::Embedding,
                        "none" => RankerKind::None,
                        other => anyhow::bail!("Unknown ranker '{}' (expected embedding or none)", other),
                    }
                }
                "search-limit" => cfg.search_limit = value.parse()?,
                "history-limit" => cfg.history_limit = value.parse()?,
                "embedding-dim" => cfg.embedding_dim = value.parse()?,
                other => anyhow::bail!("Unknown config key '{}'", other),
            }
            manager.save()?;
            if json_mode {
                println!("{}", json_output(true, serde_json::json!({ "key": key, "value": value }), None));
            } else {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = manager.get_config_path()?;
            if json_mode {
                println!("{}", json_output(true, serde_json::json!({ "path": path.to_string_lossy() }), None));
            } else {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}

// ============================================================================
// Interactive REPL
// ============================================================================

/// Minimal interactive loop: every line becomes a user message in the
/// current session, prefixed commands inspect the store. This stands in for
/// the chat UI that normally drives the store.
fn run_repl() -> Result<()> {
    let config = ConfigManager::load()?;
    let mut store = open_store(&config)?;

    let session_id = store.create_session(None);
    println!("Recall interactive mode. Session {}", session_id);
    println!("Commands: /search <query>, /history, /sessions, /quit. Anything else is stored.");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(query) = line.strip_prefix("/search ") {
            let hits = store.search(query, config.search_limit);
            if hits.is_empty() {
                println!("No results.");
            }
            for hit in &hits {
                println!("[{:.3}] {}: {}", hit.score, hit.role, hit.content);
            }
        } else if line == "/history" {
            for message in store.get_session_messages(&session_id, config.history_limit) {
                println!("{}: {}", message.role, message.content);
            }
        } else if line == "/sessions" {
            for session in store.get_all_sessions() {
                println!("{}  {} ({} messages)", session.id, session.title, session.message_count);
            }
        } else if line == "/quit" || line == "/exit" {
            break;
        } else if line.starts_with('/') {
            println!("Unknown command: {}", line);
        } else {
            store.add_message(&session_id, Role::User, line);
        }
    }

    Ok(())
}
