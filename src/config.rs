//! oscsend configuration

use crate::ramp::MAX_GRANULARITY;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscConfig {
    /// Local UDP address to send from
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Where messages are sent
    #[serde(default)]
    pub target: TargetConfig,

    /// Fade defaults
    #[serde(default)]
    pub fade: FadeConfig,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            target: TargetConfig::default(),
            fade: FadeConfig::default(),
        }
    }
}

/// Destination endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target host name or IP
    pub host: String,

    /// Target UDP port
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 53000,
        }
    }
}

/// Fade defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FadeConfig {
    /// Fade time used when a command does not give one
    #[serde(with = "humantime_serde")]
    pub default_duration: Duration,

    /// Decimal digits for float fades (0-4)
    pub default_granularity: u32,

    /// Extra time to wait after the last scheduled message before exiting
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            default_duration: Duration::from_secs(1),
            default_granularity: 2,
            settle: Duration::from_millis(50),
        }
    }
}

impl OscConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.target.host.trim().is_empty() {
            return Err("Target host must be set".to_string());
        }

        if self.target.port == 0 {
            return Err("Target port must be nonzero".to_string());
        }

        if self.fade.default_granularity > MAX_GRANULARITY {
            return Err(format!(
                "Fade granularity must be between 0 and {}",
                MAX_GRANULARITY
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OscConfig::default();
        assert_eq!(config.target.host, "127.0.0.1");
        assert_eq!(config.fade.default_granularity, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = OscConfig::default();

        config.target.port = 0;
        assert!(config.validate().is_err());

        config.target.port = 9000;
        config.fade.default_granularity = 5;
        assert!(config.validate().is_err());

        config.fade.default_granularity = 4;
        config.target.host = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: OscConfig = toml::from_str(
            r#"
            bind = "127.0.0.1:9001"

            [target]
            host = "10.0.0.5"
            port = 8000

            [fade]
            default_duration = "2s 500ms"
            default_granularity = 3
            settle = "100ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.target.port, 8000);
        assert_eq!(config.bind, "127.0.0.1:9001".parse().unwrap());
        assert_eq!(config.fade.default_duration, Duration::from_millis(2500));
        assert_eq!(config.fade.settle, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sections_optional() {
        let config: OscConfig = toml::from_str("[target]\nhost = \"mixer.local\"\nport = 10023\n").unwrap();
        assert_eq!(config.target.host, "mixer.local");
        assert_eq!(config.fade.default_duration, Duration::from_secs(1));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("oscsend-config-{}.toml", std::process::id()));
        let mut config = OscConfig::default();
        config.target.port = 7001;
        config.to_file(&path).unwrap();

        let loaded = OscConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.target.port, 7001);
        assert_eq!(loaded.fade.settle, config.fade.settle);
    }
}
