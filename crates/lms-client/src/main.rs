//! LMS Client - command-line access to the LMS REST backend

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use lms_core::{AUTH_TOKEN_KEY, BaseRepository, CacheManager, HttpClientFactory};
use lms_http::QueryParams;
use lms_storage::{FileStore, KeyValueStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::Config;

/// Name of the HTTP client shared by every repository
const API_CLIENT: &str = "lms-api";

/// LMS Client - cached, retrying access to LMS entities
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/lms.toml", env = "LMS_CONFIG")]
    config: String,

    /// Backend base URL, overriding `[http].base_url`
    #[arg(long, env = "LMS_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List an entity collection
    List {
        entity: String,
        /// Filter as key=value; values are parsed as JSON when possible
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Fetch one record
    Get { entity: String, id: String },
    /// Count matching records
    Count {
        entity: String,
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Check whether a record exists
    Exists { entity: String, id: String },
    /// Create a record from a JSON document
    Create {
        entity: String,
        #[arg(short, long)]
        data: String,
    },
    /// Patch a record with a JSON document
    Update {
        entity: String,
        id: String,
        #[arg(short, long)]
        data: String,
    },
    /// Delete a record
    Delete { entity: String, id: String },
    /// Store the bearer token sent with every request
    Login {
        #[arg(long, env = "LMS_TOKEN")]
        token: String,
    },
    /// Forget the stored bearer token
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(base_url) = args.base_url {
        config.http.base_url = Some(base_url);
    }

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting LMS Client v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&config.storage.path)
            .with_context(|| format!("Failed to open store at {}", config.storage.path))?,
    );

    match &args.command {
        Command::Login { token } => {
            store.set(AUTH_TOKEN_KEY, token)?;
            info!("Stored auth token");
            println!("Logged in");
            return Ok(());
        }
        Command::Logout => {
            let removed = store.remove(AUTH_TOKEN_KEY)?;
            info!("Auth token removed: {}", removed);
            println!("Logged out");
            return Ok(());
        }
        _ => {}
    }

    let caches = CacheManager::new(config.cache.clone()).with_local_store(store.clone());
    for (name, cache_config) in &config.caches {
        caches.get_cache(name, Some(cache_config.clone()));
    }

    let clients = HttpClientFactory::new(store.clone(), config.client.clone(), config.http.clone());
    let client = clients
        .create(API_CLIENT, Some(config.http.clone()))
        .context("Failed to create HTTP client")?;

    let output = match args.command {
        Command::List { entity, params } => {
            let repo = repository(&config, &caches, client, &entity);
            Value::Array(repo.get_all(to_query(params)).await?)
        }
        Command::Get { entity, id } => {
            let repo = repository(&config, &caches, client, &entity);
            repo.get_by_id(&id).await?
        }
        Command::Count { entity, params } => {
            let repo = repository(&config, &caches, client, &entity);
            Value::from(repo.count(to_query(params)).await?)
        }
        Command::Exists { entity, id } => {
            let repo = repository(&config, &caches, client, &entity);
            Value::Bool(repo.exists(&id).await?)
        }
        Command::Create { entity, data } => {
            let repo = repository(&config, &caches, client, &entity);
            repo.create(parse_data(&data)?).await?
        }
        Command::Update { entity, id, data } => {
            let repo = repository(&config, &caches, client, &entity);
            repo.update(&id, parse_data(&data)?).await?
        }
        Command::Delete { entity, id } => {
            let repo = repository(&config, &caches, client, &entity);
            repo.delete(&id).await?;
            serde_json::json!({ "deleted": id })
        }
        Command::Login { .. } | Command::Logout => {
            return Err(anyhow!("auth commands are handled before client setup"));
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Build the repository for `entity` from its `[[repositories]]` entry
fn repository(
    config: &Config,
    caches: &CacheManager,
    client: Arc<lms_http::HttpClient>,
    entity: &str,
) -> BaseRepository<Value> {
    let entry = config.repository(entity);
    let cache_name = entry.cache_name();
    let cache = caches.get_cache(cache_name, config.cache_config(cache_name));

    debug!("Using cache {} for {}", cache_name, entity);

    BaseRepository::new(entry.to_repository_config(), client).with_cache(cache)
}

/// Parse a `key=value` pair; the value is JSON when it parses, a string otherwise
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value: no `=` found in `{}`", raw))?;
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in `{}`", raw));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn to_query(params: Vec<(String, Value)>) -> QueryParams {
    params.into_iter().collect()
}

fn parse_data(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--data is not valid JSON: {}", raw))
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
