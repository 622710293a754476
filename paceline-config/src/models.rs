use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use paceline_core::orchestrator::{PageControllerConfig, RetryPolicy};
use paceline_core::page::{PageTiming, WatchPageMatcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigLoadError;

pub const CONFIG_PATH_ENV: &str = "PACELINE_CONFIG_PATH";
pub const CONFIG_JSON_ENV: &str = "PACELINE_CONFIG_JSON";
pub const DEFAULT_CONFIG_FILE: &str = "paceline.toml";

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Everything tunable about Paceline. Missing keys fall back to the defaults
/// the extension ships with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacelineConfig {
    /// Which URLs count as watch pages and where the video id lives.
    pub site: WatchPageMatcher,
    /// Bound on the wait for the player and channel name to render.
    pub retry: RetryPolicy,
    /// Settle delays before the first attempt after each page signal.
    pub timing: PageTiming,
    /// JSON file holding `channels` and `defaultSpeed`.
    pub store_path: PathBuf,
    /// Turn on debug-level diagnostics.
    pub debug: bool,
}

impl Default for PacelineConfig {
    fn default() -> Self {
        Self {
            site: WatchPageMatcher::default(),
            retry: RetryPolicy::default(),
            timing: PageTiming::default(),
            store_path: PathBuf::from("paceline-settings.json"),
            debug: false,
        }
    }
}

impl PacelineConfig {
    /// Load configuration from the process environment.
    /// Evaluation order:
    /// 1) `$PACELINE_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$PACELINE_CONFIG_JSON` (inline JSON),
    /// 3) `./paceline.toml` when present,
    /// 4) defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        Self::load_with(|key| std::env::var(key).ok(), Path::new("."))
    }

    /// [`PacelineConfig::load_from_env`] with an explicit variable lookup and
    /// base directory for the default file.
    pub fn load_with<F>(lookup: F, base_dir: &Path) -> anyhow::Result<(Self, ConfigSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path_str) = lookup(CONFIG_PATH_ENV)
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str.trim());
            let config = Self::load_from_file(&path)
                .with_context(|| format!("{CONFIG_PATH_ENV} points at an unusable file"))?;
            info!(path = %path.display(), "Loaded configuration from {CONFIG_PATH_ENV}");
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Some(raw) = lookup(CONFIG_JSON_ENV)
            && !raw.trim().is_empty()
        {
            let config = Self::parse_json(&raw, CONFIG_JSON_ENV)
                .and_then(Self::validated)
                .with_context(|| format!("failed to parse {CONFIG_JSON_ENV}"))?;
            info!("Loaded configuration from {CONFIG_JSON_ENV}");
            return Ok((config, ConfigSource::EnvInline));
        }

        let default_file = base_dir.join(DEFAULT_CONFIG_FILE);
        if default_file.exists() {
            let config = Self::load_from_file(&default_file)?;
            info!(path = %default_file.display(), "Loaded configuration file");
            return Ok((config, ConfigSource::File(default_file)));
        }

        debug!(base_dir = %base_dir.display(), "No configuration found, using defaults");
        Ok((Self::default(), ConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents, &origin)?,
            Some("toml") => Self::parse_toml(&contents, &origin)?,
            _ => Self::parse_from_str(&contents, &origin)?,
        };
        Self::validated(config)
    }

    /// Try TOML first, then JSON.
    pub fn parse_from_str(contents: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        Self::parse_toml(contents, origin).or_else(|toml_err| {
            Self::parse_json(contents, origin).map_err(|json_err| ConfigLoadError::Parse {
                origin: origin.to_string(),
                message: format!("toml error: {toml_err}; json error: {json_err}"),
            })
        })
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigLoadError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.site.host.trim().is_empty() {
            return Err(ConfigLoadError::Invalid("site.host must not be empty".into()));
        }
        if !self.site.watch_path.starts_with('/') {
            return Err(ConfigLoadError::Invalid(format!(
                "site.watch_path must start with '/', got {:?}",
                self.site.watch_path
            )));
        }
        Ok(())
    }

    /// Settings for the per-page orchestrator.
    pub fn controller_config(&self) -> PageControllerConfig {
        PageControllerConfig {
            site: self.site.clone(),
            retry: self.retry,
            timing: self.timing,
        }
    }

    fn validated(config: Self) -> Result<Self, ConfigLoadError> {
        config.validate()?;
        Ok(config)
    }

    fn parse_json(raw: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        serde_json::from_str(raw).map_err(|err| ConfigLoadError::Parse {
            origin: origin.to_string(),
            message: err.to_string(),
        })
    }

    fn parse_toml(raw: &str, origin: &str) -> Result<Self, ConfigLoadError> {
        toml::from_str(raw).map_err(|err| ConfigLoadError::Parse {
            origin: origin.to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_extension_constants() {
        let config = PacelineConfig::default();
        assert_eq!(config.retry.max_attempts, 20);
        assert_eq!(config.retry.interval_ms, 500);
        assert_eq!(config.timing.initial_delay_ms, 1_000);
        assert_eq!(config.timing.history_settle_ms, 500);
        assert_eq!(config.site.host, "youtube.com");
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = PacelineConfig::parse_from_str(
            "debug = true\n[retry]\ninterval_ms = 250\n",
            "inline",
        )
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.retry.interval_ms, 250);
        assert_eq!(config.retry.max_attempts, 20);
        assert_eq!(config.timing, PageTiming::default());
    }

    #[test]
    fn unparseable_text_reports_both_formats() {
        let err = PacelineConfig::parse_from_str("retry = [", "inline").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("toml error"), "{message}");
        assert!(message.contains("json error"), "{message}");
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = PacelineConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigLoadError::Invalid(_))));
    }
}
