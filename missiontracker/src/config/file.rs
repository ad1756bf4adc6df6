//! INI parsing and rendering for [`ConfigFile`].

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::logging::LogConfig;
use crate::offline::OfflineConfig;
use crate::publish::{PublishTarget, PublisherConfig};

const APP_DIR: &str = "missiontracker";
const FILE_NAME: &str = "config.ini";

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("Invalid value for {section}.{key}: '{value}'")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(FILE_NAME)
}

/// Effective configuration for every component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub publisher: PublisherConfig,
    pub offline: OfflineConfig,
    pub logging: LogConfig,
}

impl ConfigFile {
    /// Load from the default path. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        Self::from_ini(&Ini::load_from_str(text)?)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("publisher")) {
            config.publisher = parse_publisher(section)?;
        }
        if let Some(section) = ini.section(Some("offline")) {
            config.offline = parse_offline(section)?;
        }
        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = section.get("level") {
                if EnvFilter::try_new(level).is_err() {
                    return Err(invalid("logging", "level", level));
                }
                config.logging.level = level.to_string();
            }
            config.logging.file = section.get("file").map(PathBuf::from);
        }

        Ok(config)
    }

    /// Write to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        self.to_ini().write_to_file(path).map_err(write_error)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.to_ini().write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        let interval = self.publisher.min_interval.as_millis().to_string();
        match &self.publisher.target {
            PublishTarget::SharedField { document, field } => {
                ini.with_section(Some("publisher"))
                    .set("min_interval_ms", interval)
                    .set("mode", "team")
                    .set("document", document.as_str())
                    .set("field", field.as_str());
            }
            PublishTarget::MemberDocument { collection } => {
                ini.with_section(Some("publisher"))
                    .set("min_interval_ms", interval)
                    .set("mode", "member")
                    .set("collection", collection.as_str());
            }
        }

        ini.with_section(Some("offline"))
            .set("enabled", self.offline.enabled.to_string())
            .set("style_url", self.offline.style_url.as_str())
            .set("min_zoom", self.offline.min_zoom.to_string())
            .set("max_zoom", self.offline.max_zoom.to_string())
            .set("pixel_ratio", self.offline.pixel_ratio.to_string())
            .set(
                "retry_delay_secs",
                self.offline.retry_delay.as_secs().to_string(),
            );

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str());
        if let Some(file) = &self.logging.file {
            ini.with_section(Some("logging"))
                .set("file", file.to_string_lossy().into_owned());
        }

        ini
    }
}

fn invalid(section: &'static str, key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
    }
}

fn parse_key<T: FromStr>(
    properties: &Properties,
    section: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    properties
        .get(key)
        .map(|value| value.trim().parse().map_err(|_| invalid(section, key, value)))
        .transpose()
}

fn parse_publisher(section: &Properties) -> Result<PublisherConfig, ConfigError> {
    let mut config = PublisherConfig::default();

    if let Some(ms) = parse_key::<u64>(section, "publisher", "min_interval_ms")? {
        config.min_interval = Duration::from_millis(ms);
    }

    config.target = match section.get("mode").map(str::trim) {
        None | Some("team") => {
            let mut target = PublishTarget::default();
            if let PublishTarget::SharedField { document, field } = &mut target {
                if let Some(value) = section.get("document") {
                    *document = value.to_string();
                }
                if let Some(value) = section.get("field") {
                    *field = value.to_string();
                }
            }
            target
        }
        Some("member") => {
            let mut target = PublishTarget::member_default();
            if let (PublishTarget::MemberDocument { collection }, Some(value)) =
                (&mut target, section.get("collection"))
            {
                *collection = value.to_string();
            }
            target
        }
        Some(other) => return Err(invalid("publisher", "mode", other)),
    };

    Ok(config)
}

fn parse_offline(section: &Properties) -> Result<OfflineConfig, ConfigError> {
    let mut config = OfflineConfig::default();

    if let Some(enabled) = parse_key(section, "offline", "enabled")? {
        config.enabled = enabled;
    }
    if let Some(style_url) = section.get("style_url") {
        config.style_url = style_url.to_string();
    }
    if let Some(zoom) = parse_key::<f64>(section, "offline", "min_zoom")? {
        config.min_zoom = zoom;
    }
    if let Some(zoom) = parse_key::<f64>(section, "offline", "max_zoom")? {
        if zoom < config.min_zoom {
            return Err(invalid("offline", "max_zoom", &zoom.to_string()));
        }
        config.max_zoom = zoom;
    }
    if let Some(ratio) = parse_key::<f32>(section, "offline", "pixel_ratio")? {
        if ratio <= 0.0 {
            return Err(invalid("offline", "pixel_ratio", &ratio.to_string()));
        }
        config.pixel_ratio = ratio;
    }
    if let Some(secs) = parse_key::<u64>(section, "offline", "retry_delay_secs")? {
        config.retry_delay = Duration::from_secs(secs);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::DEFAULT_STYLE_URL;
    use crate::publish::DEFAULT_MIN_INTERVAL;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ConfigFile::from_ini_str("").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.publisher.min_interval, DEFAULT_MIN_INTERVAL);
        assert_eq!(config.offline.style_url, DEFAULT_STYLE_URL);
    }

    #[test]
    fn test_parses_every_section() {
        let text = "\
[publisher]
min_interval_ms = 5000
mode = member
collection = game/members

[offline]
enabled = false
max_zoom = 16
pixel_ratio = 2

[logging]
level = debug
file = /tmp/tracker.log
";
        let config = ConfigFile::from_ini_str(text).unwrap();
        assert_eq!(config.publisher.min_interval, Duration::from_millis(5000));
        assert_eq!(
            config.publisher.target,
            PublishTarget::MemberDocument {
                collection: "game/members".to_string()
            }
        );
        assert!(!config.offline.enabled);
        assert_eq!(config.offline.max_zoom, 16.0);
        assert_eq!(config.offline.pixel_ratio, 2.0);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/tracker.log")));
    }

    #[test]
    fn test_team_mode_overrides() {
        let text = "[publisher]\ndocument = game/positions\nfield = squad\n";
        let config = ConfigFile::from_ini_str(text).unwrap();
        assert_eq!(
            config.publisher.target,
            PublishTarget::SharedField {
                document: "game/positions".to_string(),
                field: "squad".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = ConfigFile::from_ini_str("[publisher]\nmin_interval_ms = soon\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                section: "publisher",
                key: "min_interval_ms",
                ..
            }
        ));

        let err = ConfigFile::from_ini_str("[publisher]\nmode = squad\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "mode", .. }));

        let err = ConfigFile::from_ini_str("[offline]\nmin_zoom = 10\nmax_zoom = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "max_zoom", .. }));
    }

    #[test]
    fn test_rendered_config_reloads_identically() {
        let mut config = ConfigFile::default();
        config.publisher.target = PublishTarget::member_default();
        config.offline.max_zoom = 15.0;
        config.logging.file = Some(PathBuf::from("tracker.log"));

        let reloaded = ConfigFile::from_ini_str(&config.to_ini_string()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.offline.enabled = false;
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }
}
