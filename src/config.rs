//! Configuration for the serving shell.
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! the `DASHBOARD_RELAY_CHAT_URL` environment variable, then CLI flags
//! (applied by the caller through [`RelayConfig::apply_overrides`]).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{RelayError, Result};
use crate::render::DEFAULT_FRAME_TITLE;

/// Environment variable overriding the chat frame address.
pub const CHAT_URL_ENV: &str = "DASHBOARD_RELAY_CHAT_URL";

pub const DEFAULT_CHAT_URL: &str = "http://localhost:8026";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Open the parent page in a browser once listening.
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { host: "127.0.0.1".into(), port: DEFAULT_PORT, open_browser: true }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// Source of the chat frame.
    pub url: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig { url: DEFAULT_CHAT_URL.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// `title` attribute of the embedded dashboard frame.
    pub title: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig { title: DEFAULT_FRAME_TITLE.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// wasm-pack output directory served under `/pkg/`.
    pub dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        AssetsConfig { dir: PathBuf::from("pkg") }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub dashboard: DashboardConfig,
    pub assets: AssetsConfig,
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub chat_url: Option<String>,
    pub assets_dir: Option<PathBuf>,
    pub no_open: bool,
}

impl RelayConfig {
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| RelayError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| RelayError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(CHAT_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.chat.url = url;
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(url) = overrides.chat_url {
            self.chat.url = url;
        }
        if let Some(dir) = overrides.assets_dir {
            self.assets.dir = dir;
        }
        if overrides.no_open {
            self.server.open_browser = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.chat.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RelayError::InvalidConfig {
                field: "chat.url",
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }
        if self.server.port == 0 {
            return Err(RelayError::InvalidConfig {
                field: "server.port",
                reason: "must be non-zero".into(),
            });
        }
        if self.server.host.trim().is_empty() {
            return Err(RelayError::InvalidConfig {
                field: "server.host",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
