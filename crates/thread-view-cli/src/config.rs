//! YAML configuration for the `tv` binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thread_view_core::{AuthorHandle, Limit, ResolveOptions, ThreadError, DEFAULT_LIMIT, DEFAULT_MAX_HOPS};
use thread_view_store_sqlite::StoreConfig;

/// On-disk shape of the config file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub store: StoreConfig,
    pub viewer: ViewerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerSection {
    pub designated_author: Option<String>,
    pub limit: u32,
    pub max_thread_depth: usize,
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self { designated_author: None, limit: DEFAULT_LIMIT, max_thread_depth: DEFAULT_MAX_HOPS }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db: Option<PathBuf>,
    pub handle: Option<String>,
    pub limit: Option<u32>,
}

/// Validated settings, built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub store: StoreConfig,
    pub designated_author: Option<AuthorHandle>,
    pub limit: Limit,
    pub resolve: ResolveOptions,
}

impl FileConfig {
    /// # Errors
    /// [`ThreadError::Configuration`] when the file is unreadable or not valid YAML.
    pub fn load(path: &Path) -> Result<Self, ThreadError> {
        let body = fs::read_to_string(path).map_err(|err| {
            ThreadError::Configuration(format!("failed to read config {}: {err}", path.display()))
        })?;
        Self::from_yaml(&body)
    }

    /// # Errors
    /// [`ThreadError::Configuration`] for malformed YAML or unknown keys.
    pub fn from_yaml(body: &str) -> Result<Self, ThreadError> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(body)
            .map_err(|err| ThreadError::Configuration(format!("invalid config: {err}")))
    }

    /// Apply overrides and validate.
    ///
    /// # Errors
    /// [`ThreadError::Configuration`] for store or depth problems,
    /// [`ThreadError::Validation`] for a bad handle or limit.
    pub fn resolve(self, overrides: Overrides) -> Result<ViewerConfig, ThreadError> {
        let mut store = self.store;
        if let Some(db) = overrides.db {
            store.path = db;
        }
        store.validate()?;

        if self.viewer.max_thread_depth == 0 {
            return Err(ThreadError::Configuration(
                "viewer.max_thread_depth MUST be greater than zero".to_string(),
            ));
        }

        let designated_author = overrides
            .handle
            .or(self.viewer.designated_author)
            .map(|raw| AuthorHandle::parse(&raw))
            .transpose()?;
        let limit = Limit::new(overrides.limit.unwrap_or(self.viewer.limit))?;

        Ok(ViewerConfig {
            store,
            designated_author,
            limit,
            resolve: ResolveOptions { max_hops: self.viewer.max_thread_depth },
        })
    }
}

impl ViewerConfig {
    /// Read the optional config file and fold in command-line overrides.
    ///
    /// # Errors
    /// See [`FileConfig::load`] and [`FileConfig::resolve`].
    pub fn build(path: Option<&Path>, overrides: Overrides) -> Result<Self, ThreadError> {
        let file = match path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        file.resolve(overrides)
    }

    /// Handle for author mode; required either in the file or on the command line.
    ///
    /// # Errors
    /// [`ThreadError::Configuration`] when no handle was configured.
    pub fn author(&self) -> Result<&AuthorHandle, ThreadError> {
        self.designated_author.as_ref().ok_or_else(|| {
            ThreadError::Configuration(
                "author mode needs viewer.designated_author or --handle".to_string(),
            )
        })
    }
}
