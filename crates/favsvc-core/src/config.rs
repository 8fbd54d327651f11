use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::mime::IconType;

/// Per-fetch timeouts in seconds (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for the page GET (HTML document).
    pub page_secs: u64,
    /// Timeout for each candidate icon GET.
    pub icon_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            page_secs: 10,
            icon_secs: 5,
        }
    }
}

/// Compiled-in default icon served when resolution finds nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultIconConfig {
    /// Path to the icon file, read once at startup.
    pub path: PathBuf,
    /// Content-type it is served with.
    pub content_type: String,
}

impl Default for DefaultIconConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("default.ico"),
            content_type: "image/x-icon".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/favsvc/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavsvcConfig {
    /// Maximum HTTP redirects followed per fetch chain before giving up.
    pub max_redirects: u32,
    /// MIME types accepted as icon payloads. Each entry must be a type
    /// the service knows how to store and sniff (see [`IconType`]).
    pub accepted_types: Vec<String>,
    /// `rel` / `name` attribute values recognized on `<link>` / `<meta>`.
    pub accepted_rels: Vec<String>,
    /// Headers sent on outbound requests.
    pub request_headers: HashMap<String, String>,
    /// Directory holding one cached icon file per host.
    pub cache_dir: PathBuf,
    /// Salt mixed into the mtime hash that forms cache ETags.
    pub etag_salt: String,
    /// Optional timeouts; if missing, built-in defaults are used.
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Default icon settings.
    #[serde(default)]
    pub default_icon: DefaultIconConfig,
}

impl Default for FavsvcConfig {
    fn default() -> Self {
        let mut request_headers = HashMap::new();
        request_headers.insert("User-Agent".to_string(), "favsvc/0.1".to_string());
        request_headers.insert("Accept".to_string(), "*/*".to_string());

        Self {
            max_redirects: 5,
            accepted_types: vec![
                "image/x-icon".to_string(),
                "image/vnd.microsoft.icon".to_string(),
                "image/png".to_string(),
                "image/gif".to_string(),
                "image/jpeg".to_string(),
                "image/svg+xml".to_string(),
            ],
            accepted_rels: vec![
                "icon".to_string(),
                "shortcut icon".to_string(),
                "apple-touch-icon".to_string(),
                "apple-touch-icon-precomposed".to_string(),
                "msapplication-TileImage".to_string(),
            ],
            request_headers,
            cache_dir: default_cache_dir(),
            etag_salt: "favsvc".to_string(),
            timeout: TimeoutConfig::default(),
            default_icon: DefaultIconConfig::default(),
        }
    }
}

impl FavsvcConfig {
    /// True if `content_type` (already stripped of parameters) is on the allow-list.
    pub fn accepts_type(&self, content_type: &str) -> bool {
        self.accepted_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }

    /// Validate the content-type table: every accepted MIME type must map
    /// to a known [`IconType`] so cached files can be sniffed back.
    pub fn validate(&self) -> Result<()> {
        for mime in &self.accepted_types {
            if IconType::from_mime(mime).is_none() {
                bail!("unknown icon content-type in config: {}", mime);
            }
        }
        if self.accepted_rels.is_empty() {
            bail!("accepted_rels must not be empty");
        }
        Ok(())
    }
}

fn default_cache_dir() -> PathBuf {
    xdg::BaseDirectories::with_prefix("favsvc")
        .map(|d| d.get_cache_home().join("icons"))
        .unwrap_or_else(|_| PathBuf::from("cache"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("favsvc")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
/// The loaded table is validated before it is returned.
pub fn load_or_init() -> Result<FavsvcConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FavsvcConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FavsvcConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
