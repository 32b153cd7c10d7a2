use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::TimeDelta;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::PiperError;

pub const DEFAULT_BASE_URL: &str = "https://idoc-medoc.ias.u-psud.fr/webs_IAS_SDO_AIA_dataset/records";
pub const DEFAULT_OUTPUT_DIR: &str = "sdo_downloads";
pub const CONFIG_FILE_NAME: &str = "aiapiper.json";
/// Widest search window around a sample, one day either side.
pub const MAX_MATCH_TOLERANCE_SECS: i64 = 86_400;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub download_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub match_tolerance_secs: Option<i64>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub page_limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub base_url: String,
    /// Connect timeout, and total timeout for records queries.
    pub timeout: Duration,
    /// Total timeout for one file transfer.
    pub download_timeout: Duration,
    pub max_retries: usize,
    pub match_tolerance: TimeDelta,
    pub output_dir: Utf8PathBuf,
    pub user_agent: String,
    pub page_limit: u32,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            download_timeout: Duration::from_secs(300),
            max_retries: 3,
            match_tolerance: TimeDelta::seconds(30),
            output_dir: Utf8PathBuf::from(DEFAULT_OUTPUT_DIR),
            user_agent: default_user_agent(),
            page_limit: 300,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("aiapiper/{}", env!("CARGO_PKG_VERSION"))
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; otherwise the working directory and the
    /// user config directory are tried before falling back to defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PiperError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("no config file found, using defaults");
            return Ok(ResolvedConfig::default());
        };

        tracing::debug!(path = %config_path.display(), "loading config");
        let config = Self::read(&config_path)?;
        Self::resolve_config(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "aia-piper")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|path| path.exists())
    }

    fn read(path: &Path) -> Result<Config, PiperError> {
        let content =
            fs::read_to_string(path).map_err(|_| PiperError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| PiperError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PiperError> {
        let defaults = ResolvedConfig::default();

        let base_url = match config.base_url {
            Some(url) => {
                let url = url.trim().trim_end_matches('/').to_string();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(PiperError::ConfigInvalid(format!(
                        "base_url must be http(s): {url}"
                    )));
                }
                url
            }
            None => defaults.base_url,
        };

        let timeout = match config.timeout_secs {
            Some(0) => {
                return Err(PiperError::ConfigInvalid(
                    "timeout_secs must be positive".to_string(),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        let download_timeout = match config.download_timeout_secs {
            Some(0) => {
                return Err(PiperError::ConfigInvalid(
                    "download_timeout_secs must be positive".to_string(),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.download_timeout,
        };

        let match_tolerance = match config.match_tolerance_secs {
            Some(secs) if secs < 0 => {
                return Err(PiperError::ConfigInvalid(
                    "match_tolerance_secs must not be negative".to_string(),
                ));
            }
            Some(secs) if secs > MAX_MATCH_TOLERANCE_SECS => {
                return Err(PiperError::ConfigInvalid(format!(
                    "match_tolerance_secs must be at most {MAX_MATCH_TOLERANCE_SECS}"
                )));
            }
            Some(secs) => TimeDelta::try_seconds(secs).ok_or_else(|| {
                PiperError::ConfigInvalid(format!("match_tolerance_secs out of range: {secs}"))
            })?,
            None => defaults.match_tolerance,
        };

        let page_limit = match config.page_limit {
            Some(0) => {
                return Err(PiperError::ConfigInvalid(
                    "page_limit must be positive".to_string(),
                ));
            }
            Some(limit) => limit,
            None => defaults.page_limit,
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            base_url,
            timeout,
            download_timeout,
            max_retries: config.max_retries.unwrap_or(defaults.max_retries),
            match_tolerance,
            output_dir: config
                .output_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_dir),
            user_agent: config.user_agent.unwrap_or(defaults.user_agent),
            page_limit,
        })
    }
}
