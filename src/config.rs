use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const YANDEX_COMPLETION_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub poll_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
    pub timeout_seconds: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub folder_id: String,
    pub endpoint_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: f64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database file path (overrides the configured one)
    #[arg(long)]
    pub database: Option<String>,

    /// Load a JSON seed file into the database and exit
    #[arg(long, value_name = "FILE")]
    pub load_seed: Option<PathBuf>,

    /// Keep existing rows when loading a seed file
    #[arg(long)]
    pub no_truncate: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder();

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/vidstat-bot/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // Environment overrides, e.g. VIDSTAT__TELEGRAM__TOKEN,
        // VIDSTAT__LLM__API_KEY, VIDSTAT__DATABASE__CONNECTION_STRING
        config_builder = config_builder.add_source(
            Environment::with_prefix("VIDSTAT")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        Ok(config)
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            poll_timeout_seconds: 25,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: "vidstat.duckdb".to_string(),
            pool_size: 5,
            timeout_seconds: 15.0,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            folder_id: String::new(),
            endpoint_url: YANDEX_COMPLETION_URL.to_string(),
            temperature: 0.0,
            max_tokens: 800,
            timeout_seconds: 30.0,
        }
    }
}
