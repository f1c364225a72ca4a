use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::store::Watermarks;

#[derive(Parser, Debug)]
#[command(name = "ashiato", about = "Diaries, friends and footprints")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub reset: ResetConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub pool_size: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub session_hours: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub sweep_secs: u64,
    pub snapshot_path: Option<PathBuf>,
    /// Users `1..=warm_user_count` are loaded before a snapshot is written
    pub warm_user_count: i64,
    /// Upper bound on concurrent store loads while warming
    pub warm_concurrency: usize,
    pub load_on_start: bool,
    pub save_on_shutdown: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ResetConfig {
    pub relations: i64,
    pub footprints: i64,
    pub entries: i64,
    pub comments: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 8,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { session_hours: 720 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            sweep_secs: 30,
            snapshot_path: None,
            warm_user_count: 500,
            warm_concurrency: 4,
            load_on_start: true,
            save_on_shutdown: false,
        }
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            relations: 500_000,
            footprints: 500_000,
            entries: 500_000,
            comments: 1_500_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_secs.max(1))
    }
}

impl ResetConfig {
    pub fn watermarks(&self) -> Watermarks {
        Watermarks {
            relations: self.relations,
            footprints: self.footprints,
            entries: self.entries,
            comments: self.comments,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("ashiato.db"));
        }
        if config.cache.snapshot_path.is_none() {
            config.cache.snapshot_path = Some(data_dir.join("identity-cache.json"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match &cli.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(".ashiato"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ashiato.db"))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.cache
            .snapshot_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("identity-cache.json"))
    }
}
