//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::errors::ConfigError;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    pub units: UnitsConfig,
    pub adapters: AdaptersConfig,
    pub whitelist: WhitelistConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitsConfig {
    /// Directory scanned for handler unit libraries; created if missing.
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdaptersConfig {
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TelegramConfig {
    pub enabled: bool,
    pub token: Option<String>,
}

/// Whitelist configuration for user access control
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct WhitelistConfig {
    pub enabled: bool,
    pub users: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "opsbot".to_string(),
                prefix: "/".to_string(),
            },
            units: UnitsConfig {
                directory: PathBuf::from("./units"),
            },
            adapters: AdaptersConfig {
                telegram: Some(TelegramConfig {
                    enabled: false,
                    token: None,
                }),
            },
            whitelist: WhitelistConfig {
                enabled: false,
                users: Vec::new(),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(ConfigError::Read)?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Build a config from environment variables alone, for running without
    /// a config file.
    pub fn load_env() -> Self {
        let mut config = Config::default();

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            config.adapters.telegram = Some(TelegramConfig {
                enabled: true,
                token: Some(token),
            });
        }

        if let Ok(users) = std::env::var("AUTHORIZED_USERS") {
            let users: Vec<String> = users
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect();
            config.whitelist = WhitelistConfig {
                enabled: !users.is_empty(),
                users,
            };
        }

        if let Ok(dir) = std::env::var("OPSBOT_UNITS_DIR") {
            config.units.directory = PathBuf::from(dir);
        }

        config
    }

    /// The allow-list for the dispatch gate; `None` means the gate is off.
    pub fn allowed_users(&self) -> Option<Vec<String>> {
        if self.whitelist.enabled {
            Some(self.whitelist.users.clone())
        } else {
            None
        }
    }

    /// The Telegram token, if the adapter is enabled and configured.
    pub fn telegram_token(&self) -> Option<String> {
        self.adapters
            .telegram
            .as_ref()
            .filter(|t| t.enabled)
            .and_then(|t| t.token.clone())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
