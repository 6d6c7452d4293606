use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    pub format: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// File holding the request line: `<url> [audio|video]`.
    pub url_file: Option<PathBuf>,
    /// Directory artifacts are written into.
    pub output_dir: Option<PathBuf>,
    /// External extraction tool binary.
    pub tool: Option<String>,
    /// Netscape-format cookie jar passed to the tool when present.
    pub cookies_file: Option<PathBuf>,
    /// Browser profile name the tool should lift cookies from.
    pub cookies_from_browser: Option<String>,
    /// Override for the built-in user-agent rotation table.
    pub user_agents: Option<Vec<String>>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    pub fn get_url_file(&self) -> PathBuf {
        self.url_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("video_url.txt"))
    }

    pub fn get_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }

    pub fn get_tool(&self) -> String {
        self.tool.clone().unwrap_or_else(|| "yt-dlp".to_string())
    }

    pub fn get_logging_format(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .unwrap_or("plain")
    }
}
