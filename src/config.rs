use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use crate::worksheets::Operation;

#[derive(Deserialize, Clone, Debug)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub owners: Vec<u64>,
    pub home_guild_id: u64,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    pub starboard: StarboardConfig,
    pub roles: RolesConfig,
    pub worksheets: WorksheetsConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StarboardConfig {
    pub channel_id: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RolesConfig {
    pub community: u64,
    /// Lowercase feature name (aliases included) to role id.
    #[serde(default)]
    pub features: HashMap<String, u64>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct WorksheetsConfig {
    pub channel_id: u64,
    pub mention_user_id: u64,
    #[serde(default = "default_worksheet_hour")]
    pub hour: u32,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
    #[serde(default = "default_operation")]
    pub operation: Operation,
    #[serde(default = "default_question_count")]
    pub questions: usize,
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

fn default_prefix() -> String {
    ">>>".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("db/administrator.db")
}

fn default_worksheet_hour() -> u32 {
    12
}

// CST
fn default_utc_offset() -> i32 {
    -6
}

fn default_operation() -> Operation {
    Operation::Mul
}

fn default_question_count() -> usize {
    30
}

impl BotConfig {
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::INFO)
    }
}

pub fn read_config(path: impl AsRef<Path>) -> anyhow::Result<BotConfig> {
    let path = path.as_ref();
    let mut file = File::open(path).with_context(|| format!("Unable to open config file {}", path.display()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).context("Unable to read the config file")?;

    let mut config = parse_config(&contents)?;
    if let Ok(token) = std::env::var("DISCORD_TOKEN") {
        config.token = token;
    }
    if config.token.is_empty() {
        anyhow::bail!("No discord token found in config or DISCORD_TOKEN");
    }

    Ok(config)
}

pub fn parse_config(contents: &str) -> anyhow::Result<BotConfig> {
    let config: BotConfig = serde_yaml::from_str(contents).context("Error parsing config file")?;
    if config.worksheets.hour > 23 {
        anyhow::bail!("worksheets.hour must be between 0 and 23, got {}", config.worksheets.hour);
    }
    if !(-12..=14).contains(&config.worksheets.utc_offset_hours) {
        anyhow::bail!("worksheets.utc_offset_hours out of range: {}", config.worksheets.utc_offset_hours);
    }

    Ok(config)
}
