// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for the outfit classifier

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `baseDataPath`
pub const BASE_PATH_ENV: &str = "DIRNAME";

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Root directory holding `data/` and `static/`
    #[serde(default = "default_base_path")]
    pub base_data_path: PathBuf,

    /// Image tree root; defaults to `<baseDataPath>/../images`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_path: Option<PathBuf>,

    /// Web server settings
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_base_path() -> PathBuf { PathBuf::from(".") }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_data_path: default_base_path(),
            images_path: None,
            web: WebConfig::default(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl AppConfig {
    /// Create a configuration rooted at `base`
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base_data_path: base.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::ClassifierError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply the `DIRNAME` override when it is set and non-empty
    pub fn apply_env(&mut self) {
        self.apply_base_override(std::env::var(BASE_PATH_ENV).ok());
    }

    fn apply_base_override(&mut self, value: Option<String>) {
        if let Some(base) = value.filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Using {} for base data path: {}", BASE_PATH_ENV, base);
            self.base_data_path = PathBuf::from(base);
        }
    }

    /// Directory holding the three JSON state files
    pub fn data_dir(&self) -> PathBuf {
        self.base_data_path.join("data")
    }

    /// Directory holding the HTML/CSS/JS assets
    pub fn static_dir(&self) -> PathBuf {
        self.base_data_path.join("static")
    }

    /// Root of the per-outfit image directories
    pub fn images_dir(&self) -> PathBuf {
        match &self.images_path {
            Some(path) => path.clone(),
            None => self.base_data_path.join("..").join("images"),
        }
    }

    /// Socket address string for the web server
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.web.host, self.web.port)
    }
}
