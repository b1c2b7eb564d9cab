//! Configuration schema (modbridge.toml)

use crate::diagnostic::{DiagnosticCode, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides.get(code.as_str()).copied().unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,

    /// Analyzer rule ids to suppress entirely
    #[serde(default)]
    pub suppress: Vec<String>,

    /// Modules to skip rewriting for (glob patterns on module name)
    #[serde(default)]
    pub skip_modules: Vec<String>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: std::path::PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            severity: SeverityThreshold::default(),
            suppress: Vec::new(),
            skip_modules: Vec::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Check if an analyzer rule id is suppressed
    pub fn is_suppressed(&self, code: DiagnosticCode) -> bool {
        self.suppress.iter().any(|s| s == code.as_str())
    }

    /// Check if a module should be skipped by the rewriter
    pub fn is_module_skipped(&self, module: &str) -> bool {
        self.skip_modules.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, module)
            } else {
                pattern == module
            }
        })
    }
}

/// Simple glob matching (supports * and **)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];

        text.starts_with(prefix) && text.ends_with(suffix)
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.suppress.is_empty());
        assert!(!config.is_module_skipped("SomeMod"));
    }

    #[test]
    fn severity_override() {
        let mut threshold = SeverityThreshold::default();
        threshold.set_override(DiagnosticCode::AvoidNetField, Severity::Error);

        assert_eq!(
            threshold.get_severity(DiagnosticCode::AvoidNetField, Severity::Warn),
            Severity::Error
        );
        assert_eq!(
            threshold.get_severity(DiagnosticCode::AvoidObsoleteField, Severity::Warn),
            Severity::Warn
        );
    }

    #[test]
    fn suppression() {
        let config = Config {
            suppress: vec!["AvoidNetField".to_string()],
            ..Config::default()
        };
        assert!(config.is_suppressed(DiagnosticCode::AvoidNetField));
        assert!(!config.is_suppressed(DiagnosticCode::AvoidObsoleteField));
    }

    #[test]
    fn skip_module_pattern_matching() {
        let config = Config {
            skip_modules: vec!["Legacy.*".to_string(), "ExactMod".to_string()],
            ..Config::default()
        };

        assert!(config.is_module_skipped("Legacy.Weather"));
        assert!(config.is_module_skipped("ExactMod"));
        assert!(!config.is_module_skipped("ModernMod"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut config = Config::default();
        config.suppress.push("AvoidNetField".to_string());
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.suppress, parsed.suppress);
    }

    #[test]
    fn glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("Legacy.*", "Legacy.Weather"));
        assert!(glob_match("*.Tools", "Contoso.Tools"));
        assert!(!glob_match("Legacy.*", "Modern.Weather"));
    }
}
