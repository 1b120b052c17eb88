//! Domain document exchange between the host agent and hook processes
//!
//! A hook receives the domain description through a file whose path is
//! named by an environment variable. The hook reads the document, may edit
//! it, and writes it back to the same path for the host agent to pick up.
//! The channel is a single slot: one reader/writer at a time.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::xml::{Element, XmlError};

/// Variable naming the domain XML hand-off file
pub const DOMXML_ENV: &str = "_hook_domxml";

/// Variable naming the JSON hand-off file
pub const JSON_ENV: &str = "_hook_json";

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Environment variable {0} is not set")]
    ConfigError(String),
    #[error("IO error on {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    ParseError(#[from] XmlError),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

fn path_from_var(var: &str) -> Result<PathBuf, HookError> {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| HookError::ConfigError(var.to_string()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, HookError> {
    std::fs::read(path).map_err(|source| HookError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), HookError> {
    std::fs::write(path, content).map_err(|source| HookError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

/// File channel carrying the domain description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomXmlChannel {
    path: PathBuf,
}

impl DomXmlChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Channel at the path named by `_hook_domxml`
    pub fn from_env() -> Result<Self, HookError> {
        Self::from_var(DOMXML_ENV)
    }

    /// Channel at the path named by an arbitrary variable
    pub fn from_var(var: &str) -> Result<Self, HookError> {
        path_from_var(var).map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the current domain description
    pub fn read_domxml(&self) -> Result<Element, HookError> {
        let content = read_file(&self.path)?;
        let domain = Element::parse_bytes(&content)?;
        if domain.name != "domain" {
            warn!(path = %self.path.display(), root = %domain.name, "Unexpected domain XML root");
        }
        debug!(path = %self.path.display(), "Read domain XML");
        Ok(domain)
    }

    /// Serialize `domain` and replace the file contents with it
    pub fn write_domxml(&self, domain: &Element) -> Result<(), HookError> {
        let xml = domain.to_xml()?;
        write_file(&self.path, xml.as_bytes())?;
        debug!(path = %self.path.display(), bytes = xml.len(), "Wrote domain XML");
        Ok(())
    }
}

/// File channel carrying a JSON payload (e.g. a device description)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonChannel {
    path: PathBuf,
}

impl JsonChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Channel at the path named by `_hook_json`
    pub fn from_env() -> Result<Self, HookError> {
        Self::from_var(JSON_ENV)
    }

    pub fn from_var(var: &str) -> Result<Self, HookError> {
        path_from_var(var).map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_json<T: DeserializeOwned>(&self) -> Result<T, HookError> {
        let content = read_file(&self.path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    pub fn write_json<T: Serialize>(&self, data: &T) -> Result<(), HookError> {
        let content = serde_json::to_vec(data)?;
        write_file(&self.path, &content)
    }
}

/// Interpret a hook custom property as a boolean
pub fn tobool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
