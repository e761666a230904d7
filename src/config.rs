use config::{Config, ConfigError, File};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ref namespace used when none is configured: pointer refs live under
/// `refs/tinderbox/state/...`, annotations under
/// `refs/notes/tinderbox/history/...`.
pub const DEFAULT_REF_NAMESPACE: &str = "tinderbox";

/// Default floor for build-duration estimates, in minutes.
pub const DEFAULT_MIN_BUILD_MINUTES: i64 = 240;

/// Scheduler configuration.
///
/// ```toml
/// # Namespace for pointer refs and notes (multiple deployments can
/// # share one repository by picking distinct namespaces)
/// ref_namespace = "tinderbox"
///
/// # Floor applied to worker duration estimates, in minutes
/// min_build_minutes = 240
/// ```
///
/// Config file location: `<config-dir>/tinderbox/config.toml`
/// (e.g. `~/.config/tinderbox/config.toml` on Linux).
///
/// Environment variables: `TINDERBOX_REF_NAMESPACE`,
/// `TINDERBOX_MIN_BUILD_MINUTES`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TinderboxConfig {
    #[serde(default = "default_namespace")]
    pub ref_namespace: String,

    #[serde(default = "default_min_build_minutes")]
    pub min_build_minutes: i64,
}

fn default_namespace() -> String {
    DEFAULT_REF_NAMESPACE.to_string()
}

fn default_min_build_minutes() -> i64 {
    DEFAULT_MIN_BUILD_MINUTES
}

impl Default for TinderboxConfig {
    fn default() -> Self {
        Self {
            ref_namespace: default_namespace(),
            min_build_minutes: default_min_build_minutes(),
        }
    }
}

impl TinderboxConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Sources in override order: defaults, then the config file when it
    /// exists, then `TINDERBOX_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("ref_namespace", defaults.ref_namespace)?
            .set_default("min_build_minutes", defaults.min_build_minutes)?;

        if let Some(config_path) = config_path()
            && config_path.exists()
        {
            builder = builder.add_source(File::from(config_path));
        }

        builder = builder.add_source(config::Environment::with_prefix("TINDERBOX"));

        let config: Self = builder.build()?.try_deserialize()?;
        if config.min_build_minutes < 0 {
            return Err(ConfigError::Message(
                "min_build_minutes must not be negative".to_string(),
            ));
        }
        Ok(config)
    }

    /// The estimate floor as a duration.
    pub fn min_build_duration(&self) -> TimeDelta {
        TimeDelta::minutes(self.min_build_minutes)
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tinderbox").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TinderboxConfig::default();
        assert_eq!(config.ref_namespace, "tinderbox");
        assert_eq!(config.min_build_minutes, 240);
    }

    #[test]
    fn test_min_build_duration_conversion() {
        let config = TinderboxConfig {
            min_build_minutes: 90,
            ..TinderboxConfig::default()
        };
        assert_eq!(config.min_build_duration(), TimeDelta::minutes(90));
    }

    #[test]
    fn test_deserialize_partial_file_uses_defaults() {
        let config: TinderboxConfig = toml_from_str(r#"ref_namespace = "nightly""#);
        assert_eq!(config.ref_namespace, "nightly");
        assert_eq!(config.min_build_minutes, 240);
    }

    fn toml_from_str(raw: &str) -> TinderboxConfig {
        Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
