use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API domain if not set)
  pub title: Option<String>,
  /// Seconds a cached list stays fresh before a background refetch
  pub stale_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
}

const DEFAULT_STALE_SECS: u64 = 300;

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./l9s.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/l9s/config.yaml
  /// 4. ~/.config/l9s/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/l9s/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("l9s.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("l9s").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the session token from environment variables.
  ///
  /// Checks L9S_TOKEN first, then LAWBIE_API_TOKEN as fallback. Absence
  /// is not an error: the app starts with its queries disabled and says
  /// so in the status line.
  pub fn api_token() -> Option<String> {
    std::env::var("L9S_TOKEN")
      .or_else(|_| std::env::var("LAWBIE_API_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  /// How long cached lists stay fresh before a background refetch.
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_secs.unwrap_or(DEFAULT_STALE_SECS))
  }
}
