use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directory that receives the copied originals.
    #[serde(default = "default_library_root")]
    pub root: PathBuf,
}

fn default_library_root() -> PathBuf {
    data_dir().join("library")
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: default_library_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub sqlite_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    data_dir().join("photoo.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Worker threads for hashing and metadata extraction (0 = one per core).
    #[serde(default)]
    pub threads: usize,

    /// Only consider files with these extensions. Empty means every regular file.
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub follow_links: bool,

    /// Read Google Photos `.json` sidecars next to the originals.
    #[serde(default = "default_read_sidecars")]
    pub read_sidecars: bool,
}

fn default_read_sidecars() -> bool {
    true
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            extensions: Vec::new(),
            follow_links: false,
            read_sidecars: default_read_sidecars(),
        }
    }
}

impl ImportConfig {
    pub fn accepts_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').to_lowercase() == ext)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Cache directory. Defaults to `.thumbnails` inside the library root.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_thumb_size")]
    pub size: u32,
}

fn default_thumb_size() -> u32 {
    300
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            path: None,
            size: default_thumb_size(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photoo")
}

impl Config {
    /// Config rooted in a single directory; handy for tests and portable installs.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            library: LibraryConfig {
                root: dir.join("library"),
            },
            database: DatabaseConfig {
                sqlite_path: dir.join("photoo.db"),
            },
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.thumbnails
            .path
            .clone()
            .unwrap_or_else(|| self.library.root.join(".thumbnails"))
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photoo")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PHOTOO_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}
