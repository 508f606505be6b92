// Copyright 2026 Toolreg Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Layered server configuration: defaults -> optional TOML file ->
//! environment variables -> CLI flag overrides (SPEC_FULL.md §4.6).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use toolreg_core::SearchMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_transport")]
    pub transport: Transport,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_http_path")]
    pub path: String,

    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    #[serde(default)]
    pub enable_auth: bool,

    #[serde(default = "default_search_method")]
    pub search_method: SearchMethod,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default = "default_device")]
    pub device: String,
}

fn default_transport() -> Transport {
    Transport::Stdio
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_http_path() -> String {
    "/".to_string()
}

/// `~/.toolreg`, per SPEC_FULL.md §6's `--data-path` default. Falls
/// back to a relative directory if `HOME` isn't set (e.g. some CI
/// sandboxes).
fn default_data_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".toolreg"),
        _ => PathBuf::from("./toolreg-data"),
    }
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Json
}

fn default_search_method() -> SearchMethod {
    SearchMethod::Bm25
}

fn default_description() -> String {
    "Tool registry and discovery service".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            host: default_host(),
            port: default_port(),
            path: default_http_path(),
            data_path: default_data_path(),
            storage_backend: default_storage_backend(),
            enable_auth: false,
            search_method: default_search_method(),
            description: default_description(),
            device: default_device(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("TRANSPORT") {
            if v.eq_ignore_ascii_case("http") {
                config.transport = Transport::Http;
            } else if v.eq_ignore_ascii_case("stdio") {
                config.transport = Transport::Stdio;
            }
        }
        if let Ok(v) = std::env::var("HOST") {
            config.host = v;
        }
        if let Ok(v) = std::env::var("PORT") {
            if let Ok(port) = v.parse() {
                config.port = port;
            }
        }
        if let Ok(v) = std::env::var("DATA_PATH") {
            config.data_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ENABLE_AUTH") {
            config.enable_auth = v.parse().unwrap_or(false);
        }
        if let Ok(v) = std::env::var("SEARCH_METHOD") {
            if let Some(method) = SearchMethod::parse(&v) {
                config.search_method = method;
            }
        }
        if let Ok(v) = std::env::var("DESCRIPTION") {
            config.description = v;
        }
        if let Ok(v) = std::env::var("DEVICE") {
            config.device = v;
        }

        config
    }

    /// Priority: file > env > defaults (CLI overrides are applied by
    /// the caller on top of this, in `main.rs`, the same way the
    /// teacher layers CLI args on top of `ServerConfig::load`).
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!(?path, "loading configuration from file");
                Self::from_file(&path)?
            } else {
                tracing::warn!(?path, "config file not found, using defaults");
                Self::default()
            }
        } else {
            Self::default()
        };

        config = Self::merge_with_env(config);
        Ok(config)
    }

    fn merge_with_env(mut config: Self) -> Self {
        let env_config = Self::from_env();
        if std::env::var("TRANSPORT").is_ok() {
            config.transport = env_config.transport;
        }
        if std::env::var("HOST").is_ok() {
            config.host = env_config.host;
        }
        if std::env::var("PORT").is_ok() {
            config.port = env_config.port;
        }
        if std::env::var("DATA_PATH").is_ok() {
            config.data_path = env_config.data_path;
        }
        if std::env::var("ENABLE_AUTH").is_ok() {
            config.enable_auth = env_config.enable_auth;
        }
        if std::env::var("SEARCH_METHOD").is_ok() {
            config.search_method = env_config.search_method;
        }
        if std::env::var("DESCRIPTION").is_ok() {
            config.description = env_config.description;
        }
        if std::env::var("DEVICE").is_ok() {
            config.device = env_config.device;
        }
        config
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Port range, data path creatability, and search method are
    /// checked before the server starts.
    pub fn validate(&self) -> Result<()> {
        if self.transport == Transport::Http {
            self.socket_addr()?;
        }
        if !self.data_path.exists() {
            std::fs::create_dir_all(&self.data_path)?;
        }
        if !self.path.starts_with('/') {
            anyhow::bail!("HTTP mount path must start with '/': {}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_stdio_on_bm25() {
        let config = ServerConfig::default();
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.search_method, SearchMethod::Bm25);
        assert!(!config.enable_auth);
    }

    #[test]
    fn from_env_overrides_defaults() {
        std::env::set_var("HOST", "0.0.0.0");
        std::env::set_var("PORT", "9000");
        std::env::set_var("SEARCH_METHOD", "regex");

        let config = ServerConfig::from_env();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.search_method, SearchMethod::Regex);

        std::env::remove_var("HOST");
        std::env::remove_var("PORT");
        std::env::remove_var("SEARCH_METHOD");
    }
}
