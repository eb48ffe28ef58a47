// ABOUTME: Configuration structures and parsing for panel timing, menu resolution, and host polling
// ABOUTME: Loaded from a TOML file in the user's config directory, created with commented defaults on first run

use crate::menu::ResolverPolicy;
use crate::panel::PanelTuning;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub menu: MenuConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    pub expand_duration_ms: u64,
    pub resize_duration_ms: u64,
    pub frame_rate: u32,
    pub collapse_delay_ms: u64,
    pub minimum_content_width: f64,
    pub screen_margin: f64,
    pub expand_horizontal: f64,
    pub expand_vertical: f64,
    pub notch_inset: f64,
    pub fallback_notch_width: f64,
    pub fallback_notch_height: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MenuConfig {
    pub retry_interval_ms: u64,
    /// 0 retries forever.
    pub max_attempts: u32,
    pub focus_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    pub pointer_poll_interval_ms: u64,
    pub screen_poll_interval_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            expand_duration_ms: 300,
            resize_duration_ms: 100,
            frame_rate: 120,
            collapse_delay_ms: 150,
            minimum_content_width: 200.0,
            screen_margin: 8.0,
            expand_horizontal: 250.0,
            expand_vertical: 100.0,
            notch_inset: 5.0,
            fallback_notch_width: 200.0,
            fallback_notch_height: 32.0,
        }
    }
}

impl Default for MenuConfig {
    fn default() -> Self {
        MenuConfig {
            retry_interval_ms: 100,
            max_attempts: 50,
            focus_poll_interval_ms: 250,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            pointer_poll_interval_ms: 16,
            screen_poll_interval_ms: 1000,
        }
    }
}

impl PanelConfig {
    pub fn tuning(&self) -> PanelTuning {
        PanelTuning {
            expand_duration: Duration::from_millis(self.expand_duration_ms),
            resize_duration: Duration::from_millis(self.resize_duration_ms),
            frame_rate: self.frame_rate,
            collapse_delay: Duration::from_millis(self.collapse_delay_ms),
            minimum_content_width: self.minimum_content_width,
            screen_margin: self.screen_margin,
            expand_horizontal: self.expand_horizontal,
            expand_vertical: self.expand_vertical,
            notch_inset: self.notch_inset,
            fallback_notch_width: self.fallback_notch_width,
            fallback_notch_height: self.fallback_notch_height,
            ..PanelTuning::default()
        }
    }
}

impl MenuConfig {
    pub fn policy(&self) -> ResolverPolicy {
        ResolverPolicy {
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
        }
    }

    pub fn focus_poll_interval(&self) -> Duration {
        Duration::from_millis(self.focus_poll_interval_ms)
    }
}

impl HostConfig {
    pub fn pointer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pointer_poll_interval_ms)
    }

    pub fn screen_poll_interval(&self) -> Duration {
        Duration::from_millis(self.screen_poll_interval_ms)
    }
}

impl Config {
    pub fn default_config_content() -> &'static str {
        r#"# NotchBar Configuration

[panel]
# Expand and collapse animation length
expand_duration_ms = 300
# Animation length when the menu content changes width
resize_duration_ms = 100
frame_rate = 120
# How long the pointer may leave the panel before it collapses
collapse_delay_ms = 150
# Narrowest the expanded panel will get, in points
minimum_content_width = 200.0
# Gap kept between the expanded panel and the screen edges
screen_margin = 8.0
# Growth of the expanded panel beyond the notch
expand_horizontal = 250.0
expand_vertical = 100.0
# Inset of the collapsed panel inside the notch
notch_inset = 5.0
# Used on displays without a notch
fallback_notch_width = 200.0
fallback_notch_height = 32.0

[menu]
# Delay between attempts while an application's menu bar reads back empty
retry_interval_ms = 100
# Give up after this many empty reads (0 retries forever)
max_attempts = 50
focus_poll_interval_ms = 250

[host]
pointer_poll_interval_ms = 16
screen_poll_interval_ms = 1000
"#
    }

    pub fn load_from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::load_from_str(&content)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(config_dir.join("notchbar").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let panel = &self.panel;
        if panel.frame_rate == 0 {
            anyhow::bail!("frame_rate must be greater than 0");
        }

        let lengths = [
            ("minimum_content_width", panel.minimum_content_width),
            ("screen_margin", panel.screen_margin),
            ("expand_horizontal", panel.expand_horizontal),
            ("expand_vertical", panel.expand_vertical),
            ("notch_inset", panel.notch_inset),
            ("fallback_notch_width", panel.fallback_notch_width),
            ("fallback_notch_height", panel.fallback_notch_height),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{name} must be a non-negative number");
            }
        }

        if self.menu.retry_interval_ms == 0 {
            anyhow::bail!("retry_interval_ms must be greater than 0");
        }

        let polls = [
            ("focus_poll_interval_ms", self.menu.focus_poll_interval_ms),
            ("pointer_poll_interval_ms", self.host.pointer_poll_interval_ms),
            ("screen_poll_interval_ms", self.host.screen_poll_interval_ms),
        ];
        for (name, value) in polls {
            if value == 0 {
                anyhow::bail!("{name} must be greater than 0");
            }
        }

        Ok(())
    }

    pub fn save_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config to: {}", path.display()))?;

        Ok(())
    }

    /// Reads the config at `path`, writing the defaults there first if it
    /// does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::save_default_config(path)?;
        }
        let config = Self::load_from_file(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_partial_config_fills_defaults() {
        let config_str = r#"
[panel]
collapse_delay_ms = 400
screen_margin = 12.0

[menu]
max_attempts = 0
"#;

        let config = Config::load_from_str(config_str).unwrap();

        assert_eq!(config.panel.collapse_delay_ms, 400);
        assert_eq!(config.panel.screen_margin, 12.0);
        assert_eq!(config.panel.frame_rate, 120); // Default value
        assert_eq!(config.menu.max_attempts, 0);
        assert_eq!(config.menu.retry_interval_ms, 100);
        assert_eq!(config.host, HostConfig::default());
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_parse_invalid_config_wrong_type() {
        let config_str = r#"
[panel]
frame_rate = "fast"  # Should be an integer
"#;

        let result = Config::load_from_str(config_str);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse configuration"));
    }

    #[test]
    fn test_tuning_conversion() {
        let tuning = PanelConfig::default().tuning();

        assert_eq!(tuning.expand_duration, Duration::from_millis(300));
        assert_eq!(tuning.resize_duration, Duration::from_millis(100));
        assert_eq!(tuning.collapse_delay, Duration::from_millis(150));
        assert_eq!(tuning, PanelTuning::default());
    }

    #[test]
    fn test_policy_conversion() {
        let policy = MenuConfig::default().policy();
        assert_eq!(policy.retry_interval, Duration::from_millis(100));
        assert_eq!(policy.max_attempts, Some(50));

        let unbounded = MenuConfig {
            max_attempts: 0,
            ..MenuConfig::default()
        };
        assert_eq!(unbounded.policy().max_attempts, None);
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path().unwrap();
        assert!(path.to_string_lossy().contains("notchbar"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_validate_zero_frame_rate() {
        let mut config = Config::default();
        config.panel.frame_rate = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("frame_rate must be greater than 0"));
    }

    #[test]
    fn test_validate_negative_margin() {
        let mut config = Config::default();
        config.panel.screen_margin = -4.0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("screen_margin"));
    }

    #[test]
    fn test_validate_zero_retry_interval() {
        let mut config = Config::default();
        config.menu.retry_interval_ms = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("retry_interval_ms"));
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = Config::default();
        config.host.pointer_poll_interval_ms = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("pointer_poll_interval_ms"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_content_can_be_parsed() {
        let content = Config::default_config_content();
        let config = Config::load_from_str(content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_default_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::save_default_config(&path).unwrap();
        let config = Config::load_from_file(&path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_create_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        fs::write(&path, "[panel]\ncollapse_delay_ms = 500\n").unwrap();
        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.panel.collapse_delay_ms, 500);
    }

    #[test]
    fn test_load_or_create_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[host]\nscreen_poll_interval_ms = 0\n").unwrap();

        let result = Config::load_or_create(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
