//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Why a module was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The module image could not be parsed at all
    Malformed,

    /// References exist that no rule and no facade can satisfy
    Incompatible,

    /// Rewriting produced a structurally invalid image - a defect in the
    /// rule set, not in the module
    InternalValidation,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed image"),
            Self::Incompatible => write!(f, "incompatible"),
            Self::InternalValidation => write!(f, "internal validation failure"),
        }
    }
}

/// One reference the rewriter could not satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    /// Canonical identity of the referenced symbol, in display form
    pub identity: String,

    /// Why the reference could not be satisfied
    pub reason: String,

    /// A human-readable suggested fix, when one is derivable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl UnresolvedReference {
    /// Create an unresolved-reference entry
    pub fn new(identity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            reason: reason.into(),
            suggestion: None,
        }
    }

    /// Attach a suggested fix
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Structured rejection record returned to the mod-loading orchestrator.
///
/// Carries enough detail to present a specific, actionable message without
/// further processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRejection {
    /// Name of the rejected module
    pub module: String,

    /// Rejection class
    pub kind: RejectionKind,

    /// Technical detail (parse error text, validation findings)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Unsatisfied references, in scan order
    pub entries: Vec<UnresolvedReference>,

    /// SHA-256 of the input module bytes, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl ModuleRejection {
    /// Create a rejection record
    pub fn new(module: impl Into<String>, kind: RejectionKind) -> Self {
        Self {
            module: module.into(),
            kind,
            detail: None,
            entries: Vec::new(),
            fingerprint: None,
        }
    }

    /// Attach technical detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach unresolved-reference entries
    pub fn with_entries(mut self, entries: Vec<UnresolvedReference>) -> Self {
        self.entries = entries;
        self
    }

    /// Attach the input fingerprint
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// The rejection as a report diagnostic, under the stable code for
    /// its kind.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self.kind {
            RejectionKind::Malformed => DiagnosticCode::ImageMalformed,
            RejectionKind::Incompatible => DiagnosticCode::RefUnresolved,
            RejectionKind::InternalValidation => DiagnosticCode::RewriteValidationFailed,
        };
        Diagnostic::new(code, Severity::Error, self.user_message())
            .with_symbol(self.module.clone())
    }

    /// Message suitable for direct display to an end user.
    ///
    /// Incompatibilities tell the user to update the mod; internal
    /// validation failures point at the rewrite rules instead.
    pub fn user_message(&self) -> String {
        match self.kind {
            RejectionKind::Malformed => format!(
                "'{}' could not be read and was not loaded; the file may be corrupt. ({})",
                self.module,
                self.detail.as_deref().unwrap_or("unparseable module image")
            ),
            RejectionKind::Incompatible => {
                let mut msg = format!(
                    "'{}' is not compatible with this version of the host and was not loaded.",
                    self.module
                );
                for entry in &self.entries {
                    msg.push_str(&format!("\n  - {} ({})", entry.identity, entry.reason));
                    if let Some(suggestion) = &entry.suggestion {
                        msg.push_str(&format!(" Suggested fix: {suggestion}"));
                    }
                }
                if self.entries.iter().all(|e| e.suggestion.is_none()) {
                    msg.push_str("\nCheck for an updated version of this mod.");
                }
                msg
            }
            RejectionKind::InternalValidation => format!(
                "'{}' was not loaded because rewriting it produced an invalid module. \
                 This is a defect in the compatibility rules, not in the mod; please report it. ({})",
                self.module,
                self.detail.as_deref().unwrap_or("no detail")
            ),
        }
    }
}

/// Per-module outcome recorded in a batch report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleOutcome {
    /// Module name
    pub module: String,

    /// SHA-256 of the input bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Number of rewrites applied (0 for a clean pass-through)
    pub rewrites_applied: usize,

    /// Rejection record, absent when the module is load-ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<ModuleRejection>,
}

/// Summary statistics for a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReportSummary {
    /// Total number of diagnostics
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of info messages
    pub info: usize,

    /// Number of modules processed
    pub modules_checked: usize,

    /// Number of modules rewritten and load-ready
    pub modules_rewritten: usize,

    /// Number of modules rejected
    pub modules_rejected: usize,
}

/// Check report (report.json v1)
///
/// This is the stable output format.
/// All fields are versioned and backward-compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Summary statistics
    pub summary: ReportSummary,

    /// All diagnostics
    pub diagnostics: Vec<Diagnostic>,

    /// Per-module outcomes (rewrite runs only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleOutcome>,

    /// Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: ReportSummary::default(),
            diagnostics: Vec::new(),
            modules: Vec::new(),
            metadata: None,
        }
    }

    /// Create a report from diagnostics
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let summary = ReportSummary {
            total: diagnostics.len(),
            errors: diagnostics.iter().filter(|d| d.severity == Severity::Error).count(),
            warnings: diagnostics.iter().filter(|d| d.severity == Severity::Warn).count(),
            info: diagnostics.iter().filter(|d| d.severity == Severity::Info).count(),
            ..ReportSummary::default()
        };

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary,
            diagnostics,
            modules: Vec::new(),
            metadata: None,
        }
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.summary.errors += 1,
            Severity::Warn => self.summary.warnings += 1,
            Severity::Info => self.summary.info += 1,
        }

        self.summary.total += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Record a module outcome, updating summary counts
    pub fn add_module_outcome(&mut self, outcome: ModuleOutcome) {
        self.summary.modules_checked += 1;
        if outcome.rejection.is_some() {
            self.summary.modules_rejected += 1;
        } else {
            self.summary.modules_rewritten += 1;
        }
        self.modules.push(outcome);
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0 || self.summary.modules_rejected > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Diagnostic, DiagnosticCode, Severity};

    #[test]
    fn empty_report() {
        let report = Report::new();
        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
    }

    #[test]
    fn report_with_diagnostics() {
        let diagnostics = vec![
            Diagnostic::new(DiagnosticCode::RefUnresolved, Severity::Error, "unresolved"),
            Diagnostic::new(DiagnosticCode::AvoidNetField, Severity::Warn, "net field"),
        ];

        let report = Report::from_diagnostics(diagnostics);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert!(report.has_errors());
    }

    #[test]
    fn module_outcomes_update_summary() {
        let mut report = Report::new();
        report.add_module_outcome(ModuleOutcome {
            module: "OldMod".into(),
            fingerprint: None,
            rewrites_applied: 3,
            rejection: None,
        });
        report.add_module_outcome(ModuleOutcome {
            module: "BrokenMod".into(),
            fingerprint: None,
            rewrites_applied: 0,
            rejection: Some(ModuleRejection::new("BrokenMod", RejectionKind::Incompatible)),
        });

        assert_eq!(report.summary.modules_checked, 2);
        assert_eq!(report.summary.modules_rewritten, 1);
        assert_eq!(report.summary.modules_rejected, 1);
        assert!(report.has_errors());
    }

    #[test]
    fn incompatible_user_message_lists_entries() {
        let rejection = ModuleRejection::new("OldMod", RejectionKind::Incompatible).with_entries(vec![
            UnresolvedReference::new("Host!StardewValley.Item::Category", "no rule matched")
                .with_suggestion("use the Category property"),
        ]);

        let msg = rejection.user_message();
        assert!(msg.contains("OldMod"));
        assert!(msg.contains("Host!StardewValley.Item::Category"));
        assert!(msg.contains("use the Category property"));
    }

    #[test]
    fn internal_validation_message_is_distinct() {
        let rejection = ModuleRejection::new("OldMod", RejectionKind::InternalValidation)
            .with_detail("dangling member ref #4");
        let msg = rejection.user_message();
        assert!(msg.contains("defect in the compatibility rules"));
        assert!(msg.contains("dangling member ref #4"));
    }

    #[test]
    fn report_serialization() {
        let report = Report::new();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"diagnostics\""));
    }
}
