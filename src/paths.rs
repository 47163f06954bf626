//! XDG-compliant path resolution for semantica.
//!
//! `SemanticaPaths` locates the config file and the embedded store directory
//! following the XDG Base Directory Specification.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(semantica::paths::no_home),
        help("Set the HOME environment variable, or pass `--config` and `--data-dir` explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(semantica::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for semantica.
#[derive(Debug, Clone)]
pub struct SemanticaPaths {
    /// `$XDG_CONFIG_HOME/semantica/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/semantica/`
    pub data_dir: PathBuf,
}

impl SemanticaPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("semantica");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("semantica");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Paths rooted at an explicit directory instead of the XDG locations.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    /// Path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("semantica.toml")
    }

    /// Directory of the embedded oxigraph store.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("oxigraph")
    }

    /// Create the config and data directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            ensure_dir(dir)?;
        }
        Ok(())
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> PathResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
        path: dir.display().to_string(),
        source: e,
    })
}
