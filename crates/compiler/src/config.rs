//! Compiler configuration.
//!
//! Options come from an optional `mica.toml` next to the source file,
//! overridden by command-line flags. The file is plain TOML:
//!
//! ```toml
//! target = "x86_64-unknown-linux-gnu"
//! keep_ir = true
//! libraries = ["m"]
//! library_paths = ["/opt/lib"]
//! ```

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Target triple; the host target when absent.
    pub target: Option<String>,

    /// Keep the intermediate `.ll` file next to the output.
    pub keep_ir: bool,

    /// Additional libraries to link.
    pub libraries: Vec<String>,

    /// Additional library search paths for linking.
    pub library_paths: Vec<String>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config '{}': {}", path.display(), e))?;
        Self::from_toml(&text)
    }

    /// Set the target triple (builder pattern).
    pub fn with_target(mut self, triple: impl Into<String>) -> Self {
        self.target = Some(triple.into());
        self
    }

    /// Add a library to link.
    pub fn with_library(mut self, lib: impl Into<String>) -> Self {
        self.libraries.push(lib.into());
        self
    }

    /// Add a library search path.
    pub fn with_library_path(mut self, path: impl Into<String>) -> Self {
        self.library_paths.push(path.into());
        self
    }
}
