//! Modbridge Core
//!
//! Core domain model with stable, versioned types.
//! Never rename diagnostic codes - they are part of the public API.

pub mod config;
pub mod diagnostic;
pub mod identity;
pub mod report;
pub mod version;

pub use config::{Config, SeverityThreshold};
pub use diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
pub use identity::{MemberIdentity, MemberKind, Signature, SymbolIdentity, TypeIdentity};
pub use report::{ModuleOutcome, ModuleRejection, RejectionKind, Report, ReportVersion, UnresolvedReference};
pub use version::{HostVersion, VersionRange};
