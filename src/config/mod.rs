//! Configuration management

use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Tracing filter applied when RUST_LOG is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub local: LocalConfig,
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybackConfig {
    /// Output device handed to the media engine; `None` lets the engine pick.
    pub output_device: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalConfig {
    /// Directories scanned for audio files by the local backend.
    #[serde(default)]
    pub library_path: Vec<PathBuf>,
}

/// Get config directory (HUB_CONFIG_DIR, then XDG/platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HUB_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/audiohub");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("audiohub");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/audiohub");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("audiohub");
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

/// Layered load: defaults, then `<config_dir>/config.{toml,json,...}`, then
/// HUB_* environment variables (HUB_LOG_FILTER, HUB_PLAYBACK__OUTPUT_DEVICE,
/// HUB_LOCAL__LIBRARY_PATH, ...).
pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let builder = ::config::Config::builder()
        .set_default("log_filter", default_log_filter())?
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        .add_source(
            ::config::Environment::with_prefix("HUB")
                // Single underscore after the prefix; double underscore only
                // for key nesting (HUB_PLAYBACK__OUTPUT_DEVICE).
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    Ok(builder.build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn defaults_when_nothing_is_configured() {
        env::set_var("HUB_CONFIG_DIR", "/tmp/audiohub-test-nonexistent");

        let config = load_config().expect("config should load");

        env::remove_var("HUB_CONFIG_DIR");

        assert_eq!(config.log_filter, "info");
        assert!(config.playback.output_device.is_none());
        assert!(config.local.library_path.is_empty());
    }

    #[test]
    #[serial]
    fn config_file_is_layered_under_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            r#"
log_filter = "debug"

[playback]
output_device = "hw:0,0"

[local]
library_path = ["/music"]
"#,
        )
        .unwrap();
        env::set_var("HUB_CONFIG_DIR", dir.path());
        env::set_var("HUB_LOG_FILTER", "trace");
        env::set_var("HUB_PLAYBACK__OUTPUT_DEVICE", "hw:1,0");

        let config = load_config().expect("config should load");

        env::remove_var("HUB_PLAYBACK__OUTPUT_DEVICE");
        env::remove_var("HUB_LOG_FILTER");
        env::remove_var("HUB_CONFIG_DIR");

        // Env wins over the file, for top-level and nested keys alike; the
        // rest comes from the file.
        assert_eq!(config.log_filter, "trace");
        assert_eq!(config.playback.output_device.as_deref(), Some("hw:1,0"));
        assert_eq!(config.local.library_path, vec![PathBuf::from("/music")]);
    }

    #[test]
    #[serial]
    fn explicit_config_dir_overrides_platform_default() {
        env::set_var("HUB_CONFIG_DIR", "/opt/audiohub");
        assert_eq!(get_config_dir(), PathBuf::from("/opt/audiohub"));
        env::remove_var("HUB_CONFIG_DIR");
    }
}
