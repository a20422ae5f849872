use crate::catalog::Catalog;
use crate::error::Result;
use crate::mutator::DEFAULT_MAX_COMMIT_ATTEMPTS;
use crate::service::ReportService;
use crate::store::Stores;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "brsr.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7878
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Redb
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/brsr.redb")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// CatalogConfig / UpdatesConfig
// ---------------------------------------------------------------------------

/// Without a path the built-in catalog is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesConfig {
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,
}

fn default_max_commit_attempts() -> u32 {
    DEFAULT_MAX_COMMIT_ATTEMPTS
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: default_max_commit_attempts(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub updates: UpdatesConfig,
}

impl Config {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog.path {
            Some(path) => Catalog::load(path),
            None => Catalog::builtin(),
        }
    }

    pub fn open_stores(&self) -> Result<Stores> {
        match self.storage.backend {
            StorageBackend::Memory => Ok(Stores::memory()),
            StorageBackend::Redb => Stores::redb(&self.storage.path),
        }
    }

    /// Catalog, stores and retry policy wired into one service.
    pub fn build_service(&self) -> Result<ReportService> {
        let catalog = self.load_catalog()?;
        info!(
            questions = catalog.len(),
            version = catalog.version(),
            backend = ?self.storage.backend,
            "building report service"
        );
        let stores = self.open_stores()?;
        Ok(ReportService::new(Arc::new(catalog), stores)
            .with_max_commit_attempts(self.updates.max_commit_attempts))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.storage.backend == StorageBackend::Redb
            && self.storage.path.as_os_str().is_empty()
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "storage.path is empty but backend is redb".to_string(),
            });
        }

        if self.storage.backend == StorageBackend::Memory {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "storage.backend is memory; reports are lost on restart".to_string(),
            });
        }

        if self.updates.max_commit_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "updates.max_commit_attempts must be at least 1".to_string(),
            });
        }

        if let Some(path) = &self.catalog.path {
            if !path.is_file() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("catalog.path '{}' is not a readable file", path.display()),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
