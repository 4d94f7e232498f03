use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::{DEFAULT_PIP_SIZE, DEFAULT_WINDOW_SIZE};

/// Window sizes offered to the user.
pub const WINDOW_SIZE_OPTIONS: [usize; 8] = [25, 50, 100, 150, 200, 300, 500, 1000];

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub deriv: DerivConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DerivConfig {
    pub ws_base_url: String,
    #[serde(default = "default_app_id")]
    pub app_id: String,
    pub symbol: String,
    #[serde(default = "default_pip_size")]
    pub pip_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_app_id() -> String {
    "1089".to_string()
}

fn default_pip_size() -> u32 {
    DEFAULT_PIP_SIZE
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_report_interval_ms() -> u64 {
    2_000
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_cooldown_ms() -> u64 {
    60_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Accept only the window sizes offered in the UI.
pub fn validate_window_size(size: usize) -> Result<usize> {
    if !WINDOW_SIZE_OPTIONS.contains(&size) {
        bail!(
            "invalid window size {}: expected one of {:?}",
            size,
            WINDOW_SIZE_OPTIONS
        );
    }
    Ok(size)
}

impl DerivConfig {
    /// `<ws_base_url>?app_id=<app_id>`
    pub fn ws_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&self.ws_base_url)
            .with_context(|| format!("invalid deriv.ws_base_url '{}'", self.ws_base_url))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => bail!("deriv.ws_base_url must use ws:// or wss://, got '{}'", other),
        }
        url.query_pairs_mut().append_pair("app_id", self.app_id.trim());
        Ok(url.to_string())
    }
}

impl Config {
    /// Load `config/default.toml` (or `$DIGIT_SCOPE_CONFIG`) with `.env`
    /// overrides applied.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("DIGIT_SCOPE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        if let Ok(app_id) = std::env::var("DERIV_APP_ID") {
            if !app_id.trim().is_empty() {
                config.deriv.app_id = app_id.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.deriv.symbol.trim().is_empty() {
            bail!("deriv.symbol must not be empty");
        }
        validate_window_size(self.analysis.window_size)
            .context("analysis.window_size is invalid")?;
        self.deriv.ws_url().context("deriv.ws_base_url is invalid")?;
        if self.reconnect.base_delay_ms == 0 {
            bail!("reconnect.base_delay_ms must be > 0");
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            bail!("reconnect.max_delay_ms must be >= reconnect.base_delay_ms");
        }
        Ok(())
    }
}
