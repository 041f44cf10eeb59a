//! Runtime configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CLAUDE_PANES_CONFIG";

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command started in every new session pane
    pub agent_command: String,

    /// Sidebar width (columns)
    pub sidebar_width: u16,

    /// Share of the main pane given to the terminal area (percent)
    pub terminal_percent: u16,

    /// Terminal tab bar height (rows)
    pub tab_bar_height: u16,

    /// Share of the sidebar column given to the diff list (percent)
    pub diff_list_percent: u16,

    /// Agent status polling interval (ms)
    pub status_interval_ms: u64,

    /// Text shown in the main pane when no session exists
    pub placeholder_hint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_command: "claude".to_string(),
            sidebar_width: 32,
            terminal_percent: 30,
            tab_bar_height: 1,
            diff_list_percent: 40,
            status_interval_ms: 2000,
            placeholder_hint: "No session. Press n in the sidebar to start one.".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_paths = [
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            dirs::config_dir().map(|p| p.join("claude-panes/config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => match Self::parse(&content) {
                    Ok(config) => {
                        tracing::info!(?path, "loaded configuration");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(?path, error = %e, "failed to parse config");
                    }
                },
                Err(e) => {
                    tracing::warn!(?path, error = %e, "failed to read config");
                }
            }
        }

        Self::default()
    }

    /// Parse a config file, clamping out-of-range values
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        config.terminal_percent = config.terminal_percent.clamp(10, 90);
        config.diff_list_percent = config.diff_list_percent.clamp(10, 90);
        config.tab_bar_height = config.tab_bar_height.max(1);
        config.sidebar_width = config.sidebar_width.max(16);
        config.status_interval_ms = config.status_interval_ms.max(250);
        Ok(config)
    }
}
