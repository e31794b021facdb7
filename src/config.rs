use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub apis: ApiConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub radar: RadarConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

/// Local data store locations. The stores are produced by external bulk
/// imports; this service only ever reads them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub patents_db_path: String,
    pub cordis_db_path: String,
    pub gleif_cache_db_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            patents_db_path: "data/patents.db".to_string(),
            cordis_db_path: "data/cordis.db".to_string(),
            gleif_cache_db_path: "data/gleif_cache.db".to_string(),
        }
    }
}

impl DataConfig {
    pub fn patents_db_available(&self) -> bool {
        Path::new(&self.patents_db_path).exists()
    }

    pub fn cordis_db_available(&self) -> bool {
        Path::new(&self.cordis_db_path).exists()
    }
}

/// Remote API credentials. All of them are optional; public access is used
/// where the API permits it.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ApiConfig {
    pub openaire_access_token: String,
    pub openaire_refresh_token: String,
    pub semantic_scholar_api_key: String,
    /// Reserved for remote fallback paths; surfaced in /health only.
    pub epo_ops_consumer_key: String,
    pub epo_ops_consumer_secret: String,
    pub cordis_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins; "*" means permissive.
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { origins: "http://localhost:3000,http://127.0.0.1:3000".to_string() }
    }
}

impl CorsConfig {
    pub fn origin_list(&self) -> Vec<String> {
        self.origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None }
    }
}

/// Radar orchestration knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Per-panel deadline in seconds.
    pub panel_timeout_secs: u64,
    /// CPC flow analyses full stores and may need a longer deadline.
    pub cpc_timeout_secs: u64,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self { panel_timeout_secs: 30, cpc_timeout_secs: 30 }
    }
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "ti-radar")]
#[command(version, about = "Technology Intelligence Radar API")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Patent store path (overrides config file)
    #[arg(long, value_name = "PATH")]
    pub patents_db: Option<String>,

    /// CORDIS store path (overrides config file)
    #[arg(long, value_name = "PATH")]
    pub cordis_db: Option<String>,

    /// Logging level (overrides config file, e.g. "info,ti_radar=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file
    /// support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();
        Self::load_with_args(&cli_args)
    }

    pub fn load_with_args(cli_args: &CommandLineArgs) -> Result<Self, anyhow::Error> {
        // .env convenience for local development
        let _ = dotenvy::dotenv();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(cli_args);
        config.validate()?;

        Ok(config)
    }

    fn find_config_file() -> Option<String> {
        ["config.toml", "conf/config.toml"]
            .iter()
            .find(|p| Path::new(p).exists())
            .map(|p| p.to_string())
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path, e))?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - SERVER_HOST / SERVER_PORT
    /// - PATENTS_DB_PATH: patent store file
    /// - CORDIS_DB_PATH: project store file
    /// - GLEIF_CACHE_DB_PATH: entity-resolution cache file
    /// - CORS_ORIGINS: comma-separated allowed origins
    /// - OPENAIRE_ACCESS_TOKEN / OPENAIRE_REFRESH_TOKEN
    /// - SEMANTIC_SCHOLAR_API_KEY
    /// - EPO_OPS_CONSUMER_KEY / EPO_OPS_CONSUMER_SECRET / CORDIS_API_KEY
    /// - LOG_LEVEL
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(path) = std::env::var("PATENTS_DB_PATH") {
            self.data.patents_db_path = path;
        }
        if let Ok(path) = std::env::var("CORDIS_DB_PATH") {
            self.data.cordis_db_path = path;
        }
        if let Ok(path) = std::env::var("GLEIF_CACHE_DB_PATH") {
            self.data.gleif_cache_db_path = path;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.cors.origins = origins;
        }
        if let Ok(token) = std::env::var("OPENAIRE_ACCESS_TOKEN") {
            self.apis.openaire_access_token = token;
        }
        if let Ok(token) = std::env::var("OPENAIRE_REFRESH_TOKEN") {
            self.apis.openaire_refresh_token = token;
        }
        if let Ok(key) = std::env::var("SEMANTIC_SCHOLAR_API_KEY") {
            self.apis.semantic_scholar_api_key = key;
        }
        if let Ok(key) = std::env::var("EPO_OPS_CONSUMER_KEY") {
            self.apis.epo_ops_consumer_key = key;
        }
        if let Ok(secret) = std::env::var("EPO_OPS_CONSUMER_SECRET") {
            self.apis.epo_ops_consumer_secret = secret;
        }
        if let Ok(key) = std::env::var("CORDIS_API_KEY") {
            self.apis.cordis_api_key = key;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.server_port {
            self.server.port = port;
        }
        if let Some(path) = &args.patents_db {
            self.data.patents_db_path = path.clone();
        }
        if let Some(path) = &args.cordis_db {
            self.data.cordis_db_path = path.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.radar.panel_timeout_secs == 0 || self.radar.cpc_timeout_secs == 0 {
            anyhow::bail!("radar timeouts must be non-zero");
        }
        // Missing store files are not fatal: the affected panels degrade
        // with warnings instead.
        if !self.data.patents_db_available() {
            tracing::warn!("Patents DB not found: {}", self.data.patents_db_path);
        }
        if !self.data.cordis_db_available() {
            tracing::warn!("CORDIS DB not found: {}", self.data.cordis_db_path);
        }
        Ok(())
    }
}
