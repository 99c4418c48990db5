//! Application configuration for coursemap.
//!
//! User config lives at `~/.coursemap/coursemap.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CourseMapError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "coursemap.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".coursemap";

// ---------------------------------------------------------------------------
// Config structs (matching coursemap.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Course store location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Course catalog source.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Majors whose requirement pages are scraped.
    #[serde(default = "default_majors")]
    pub majors: Vec<MajorSource>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
            majors: default_majors(),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite/libSQL database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("uic_courses.db")
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5001
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Department subject code whose courses are scraped (e.g. `CS`).
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Course-description page for the subject.
    #[serde(default = "default_courses_url")]
    pub courses_url: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            courses_url: default_courses_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    /// Parsed [`CatalogConfig::courses_url`].
    pub fn courses_url(&self) -> Result<Url> {
        Url::parse(&self.courses_url).map_err(|e| {
            CourseMapError::config(format!("invalid courses_url '{}': {e}", self.courses_url))
        })
    }
}

fn default_subject() -> String {
    "CS".into()
}
fn default_courses_url() -> String {
    "https://catalog.uic.edu/ucat/course-descriptions/cs/".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[[majors]]` entry: a major (and optional concentration) to scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MajorSource {
    /// Major name, e.g. "Computer Science".
    pub name: String,

    /// Concentration within the major, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<String>,

    /// Requirements page URL.
    pub url: String,

    /// Bucket name for concentration-specific courses.
    #[serde(default = "default_concentration_bucket")]
    pub concentration_bucket: String,

    /// Course numbers (in the catalog subject) that belong to the concentration bucket.
    #[serde(default)]
    pub concentration_courses: Vec<u32>,
}

impl MajorSource {
    /// Parsed [`MajorSource::url`].
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.url).map_err(|e| {
            CourseMapError::config(format!("invalid url for major '{}': {e}", self.name))
        })
    }
}

fn default_concentration_bucket() -> String {
    "Software Concentration".into()
}

fn default_majors() -> Vec<MajorSource> {
    vec![MajorSource {
        name: "Computer Science".into(),
        concentration: Some("Software Engineering".into()),
        url: "https://catalog.uic.edu/ucat/colleges-depts/engineering/cs/bs-cs-se-conc/".into(),
        concentration_bucket: default_concentration_bucket(),
        concentration_courses: vec![440, 441, 442, 443, 474, 476, 477],
    }]
}

// ---------------------------------------------------------------------------
// Serve config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime API server configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Database file to serve from.
    pub db_path: PathBuf,
}

impl From<&AppConfig> for ServeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            db_path: config.database.path.clone(),
        }
    }
}

impl ServeConfig {
    /// `host:port` string suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.coursemap/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CourseMapError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.coursemap/coursemap.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CourseMapError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CourseMapError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CourseMapError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CourseMapError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CourseMapError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check values that deserialize fine but cannot work at runtime.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let subject = &config.catalog.subject;
    if subject.is_empty() || !subject.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CourseMapError::validation(format!(
            "catalog.subject must be letters only, got '{subject}'"
        )));
    }
    config.catalog.courses_url()?;
    for major in &config.majors {
        if major.name.trim().is_empty() {
            return Err(CourseMapError::validation("major name must not be empty"));
        }
        major.url()?;
    }
    Ok(())
}
