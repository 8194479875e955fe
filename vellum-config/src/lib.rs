//! Shared configuration loader for the Vellum toolchain.
//!
//! `defaults/vellum.default.toml` is embedded into every binary so the
//! documented defaults and the runtime behavior stay in sync.
//! Applications layer user-specific files on top of those defaults via
//! [`Loader`] before deserializing into [`VellumConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../defaults/vellum.default.toml");

/// Top-level configuration consumed by Vellum applications.
#[derive(Debug, Clone, Deserialize)]
pub struct VellumConfig {
    pub documents: DocumentsConfig,
    pub completion: CompletionConfig,
    pub server: ServerConfig,
}

/// Document-model knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    /// Format assumed when the editor does not announce one.
    pub default_format: String,
}

/// Completion-related knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// Extra directories for filename completion.
    pub search_paths: Vec<PathBuf>,
    /// Offer snippet insertions to capable clients.
    pub snippets: bool,
}

/// Server process knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub log_level: String,
}

/// Layers the user's `vellum.toml` over the embedded defaults.
///
/// The server runs fine on defaults alone, so the user file is always
/// optional; the only knob worth forcing from outside a file is the
/// log level (an editor launching the server in a debug session sets
/// it without writing config to disk).
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer the user's configuration file; absent files are ignored.
    pub fn with_user_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Force the stderr log level, winning over defaults and the user
    /// file alike.
    pub fn with_log_level(mut self, level: &str) -> Result<Self, ConfigError> {
        self.builder = self.builder.set_override("server.log_level", level)?;
        Ok(self)
    }

    /// Finalize and deserialize the resulting configuration.
    pub fn build(self) -> Result<VellumConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_deserialize() {
        let config = Loader::new().build().expect("defaults parse");
        assert_eq!(config.documents.default_format, "latex");
        assert!(config.completion.search_paths.is_empty());
        assert!(config.completion.snippets);
        assert_eq!(config.server.log_level, "info");
    }

    #[test]
    fn log_level_override_wins_over_defaults() {
        let config = Loader::new()
            .with_log_level("debug")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.server.log_level, "debug");
    }

    #[test]
    fn missing_user_file_is_ignored() {
        let config = Loader::new()
            .with_user_file("/no/such/vellum.toml")
            .build()
            .expect("defaults still apply");
        assert_eq!(config.documents.default_format, "latex");
    }
}
