//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
///
/// Analyzer rule ids keep their originally published PascalCase form so
/// existing suppression lists keep working; engine codes use the
/// SCREAMING_SNAKE_CASE report convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Rewriting pipeline
    /// The module image could not be parsed or is structurally corrupt
    #[serde(rename = "IMAGE_MALFORMED")]
    ImageMalformed,

    /// A reference matched no rule and does not resolve in the host API
    #[serde(rename = "REF_UNRESOLVED")]
    RefUnresolved,

    /// Two equally specific rules matched the same reference
    #[serde(rename = "RULE_CONFLICT")]
    RuleConflict,

    /// Rewriting completed but produced a structurally invalid image
    #[serde(rename = "REWRITE_VALIDATION_FAILED")]
    RewriteValidationFailed,

    /// A facade shim was constructed standalone instead of bound to a host instance
    #[serde(rename = "FACADE_MISUSE")]
    FacadeMisuse,

    // Build-time analyzer rules
    /// Direct access to a live-synced wrapper field with a safer replacement
    AvoidNetField,

    /// Access to a field the host has replaced outright
    AvoidObsoleteField,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageMalformed => "IMAGE_MALFORMED",
            Self::RefUnresolved => "REF_UNRESOLVED",
            Self::RuleConflict => "RULE_CONFLICT",
            Self::RewriteValidationFailed => "REWRITE_VALIDATION_FAILED",
            Self::FacadeMisuse => "FACADE_MISUSE",
            Self::AvoidNetField => "AvoidNetField",
            Self::AvoidObsoleteField => "AvoidObsoleteField",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - the module cannot be loaded / the build should fail
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path relative to project root
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,

    /// Optional column number (1-indexed)
    pub column: Option<usize>,

    /// Optional end column (exclusive, for expression spans)
    pub end_column: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            end_column: None,
        }
    }

    /// Create a location with file and line number
    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: None,
            end_column: None,
        }
    }

    /// Create a location with file, line, and column
    pub fn with_position(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: Some(column),
            end_column: None,
        }
    }

    /// Set the end column (exclusive)
    pub fn spanning(mut self, end_column: usize) -> Self {
        self.end_column = Some(end_column);
        self
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source location (best-effort)
    pub location: Option<Location>,

    /// The offending symbol or expression, as written
    pub symbol: Option<String>,

    /// Suggested replacement, when one is known
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            symbol: None,
            suggestion: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the offending symbol or expression text
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Set the suggested replacement
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        // Ensure codes are stable strings
        assert_eq!(DiagnosticCode::RefUnresolved.as_str(), "REF_UNRESOLVED");
        assert_eq!(DiagnosticCode::AvoidNetField.as_str(), "AvoidNetField");
        assert_eq!(DiagnosticCode::FacadeMisuse.as_str(), "FACADE_MISUSE");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::AvoidNetField,
            Severity::Warn,
            "'item.category' is a NetInt field",
        )
        .with_location(Location::with_position("ModEntry.cs", 13, 25))
        .with_suggestion("Category");

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("AvoidNetField"));
        assert!(json.contains("warn"));
        assert!(json.contains("Category"));
    }

    #[test]
    fn location_span() {
        let loc = Location::with_position("a.cs", 3, 10).spanning(23);
        assert_eq!(loc.line, Some(3));
        assert_eq!(loc.column, Some(10));
        assert_eq!(loc.end_column, Some(23));
    }
}
