//! Definition loading
//!
//! Turns raw definition bytes into artifacts by handing them to the
//! synchronizer registered for the file extension. Reading files is the
//! caller's business.

use std::sync::Arc;

use ddlsync_core::{Artifact, Config, ParseError};

use crate::registry::SynchronizerRegistry;

/// Raw content of one definition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSource {
    /// Location the definition was read from (e.g. a path relative to the
    /// definitions root)
    pub location: String,

    pub content: Vec<u8>,
}

impl DefinitionSource {
    pub fn new(location: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            location: location.into(),
            content: content.into(),
        }
    }

    /// File extension of the location, without the dot
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.location)
    }
}

fn extension_of(location: &str) -> Option<&str> {
    let file = location.rsplit(['/', '\\']).next().unwrap_or(location);
    file.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
}

/// Parses definitions through a synchronizer registry
#[derive(Debug, Clone)]
pub struct DefinitionLoader {
    registry: SynchronizerRegistry,
    config: Arc<Config>,
}

impl DefinitionLoader {
    pub fn new(registry: SynchronizerRegistry, config: Arc<Config>) -> Self {
        Self { registry, config }
    }

    /// Whether some synchronizer handles this location
    pub fn accepts(&self, location: &str) -> bool {
        extension_of(location).is_some_and(|ext| self.registry.by_extension(ext).is_some())
    }

    /// Parse one definition into its artifacts
    pub fn load(&self, location: &str, content: &[u8]) -> Result<Vec<Artifact>, ParseError> {
        let synchronizer = extension_of(location)
            .and_then(|ext| self.registry.by_extension(ext))
            .ok_or_else(|| ParseError::new(location, "no synchronizer handles this file type"))?;

        let artifacts = synchronizer.parse(location, content, &self.config)?;
        tracing::debug!(location, artifacts = artifacts.len(), "loaded definition");
        Ok(artifacts)
    }

    /// Parse every source, collecting failures instead of stopping at the first
    pub fn load_all(&self, sources: &[DefinitionSource]) -> (Vec<Artifact>, Vec<ParseError>) {
        let mut artifacts = Vec::new();
        let mut errors = Vec::new();

        for source in sources {
            match self.load(&source.location, &source.content) {
                Ok(loaded) => artifacts.extend(loaded),
                Err(e) => {
                    tracing::warn!(location = %source.location, error = %e.message, "definition not admitted");
                    errors.push(e);
                }
            }
        }

        (artifacts, errors)
    }
}
