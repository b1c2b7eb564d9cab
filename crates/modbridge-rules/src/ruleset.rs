//! Ruleset document loading
//!
//! A ruleset is the single static artifact the host ships per release:
//! the current API surface, the rewrite rules, the facade descriptors,
//! and the analyzer field guidance. It is loaded once at startup and
//! compiled into the read-only registry/provider/API-table triple the
//! pipeline shares across modules.

use crate::facade::{FacadeDescriptor, FacadeProvider};
use crate::host_api::{ApiMember, HostApiTable};
use crate::registry::{FieldGuidance, RewriteAction, RewriteRule, RuleRegistry};
use modbridge_core::version::HostVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Identity of the host release a ruleset describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Host application name
    pub name: String,

    /// Current host version
    pub version: HostVersion,
}

/// One exported host type with its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTypeEntry {
    /// Declaring module name
    pub module: String,

    /// Namespace (may be empty)
    #[serde(default)]
    pub namespace: String,

    /// Simple type name
    pub name: String,

    /// Exported members
    #[serde(default)]
    pub members: Vec<ApiMember>,
}

/// The ruleset document as shipped (ruleset.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Host release this ruleset targets
    pub host: HostInfo,

    /// Current API surface
    #[serde(default)]
    pub api: Vec<ApiTypeEntry>,

    /// Rewrite rules, in registration order
    #[serde(default)]
    pub rules: Vec<RewriteRule>,

    /// Facade descriptors
    #[serde(default)]
    pub facades: Vec<FacadeDescriptor>,

    /// Risky-field guidance for the build-time analyzer
    #[serde(default)]
    pub guidance: Vec<FieldGuidance>,
}

impl Ruleset {
    /// Parse a ruleset from JSON
    pub fn from_json(json: &str) -> Result<Self, RulesetError> {
        serde_json::from_str(json).map_err(|e| RulesetError::Parse(e.to_string()))
    }

    /// Load a ruleset from a file
    pub fn from_file(path: &Path) -> Result<Self, RulesetError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RulesetError::Io(path.display().to_string(), e.to_string()))?;
        Self::from_json(&contents)
    }

    /// Compile into the read-only lookup structures.
    ///
    /// Cross-references are checked here, once, so that nothing can dangle
    /// mid-run: every rule pointing at a facade must name a registered
    /// one, facade ids must be unique, and every forwarding target must
    /// exist in the declared API surface.
    pub fn compile(self) -> Result<CompiledRuleset, RulesetError> {
        let mut api = HostApiTable::new();
        for entry in &self.api {
            let t = modbridge_core::identity::TypeIdentity::new(
                &entry.module,
                &entry.namespace,
                &entry.name,
            );
            api.add_type(&t);
            for member in &entry.members {
                api.add_member(&t, member.clone());
            }
        }

        let mut seen = HashSet::new();
        for facade in &self.facades {
            if !seen.insert(facade.id.as_str().to_string()) {
                return Err(RulesetError::DuplicateFacade {
                    facade: facade.id.as_str().to_string(),
                });
            }
            for entry in &facade.entries {
                if entry.old.declaring != facade.fronts {
                    return Err(RulesetError::FacadeEntryMismatch {
                        facade: facade.id.as_str().to_string(),
                        member: entry.old.to_string(),
                    });
                }
                if !api.resolves_member(&entry.target) {
                    return Err(RulesetError::FacadeTargetMissing {
                        facade: facade.id.as_str().to_string(),
                        target: entry.target.to_string(),
                    });
                }
            }
        }

        for rule in &self.rules {
            if let RewriteAction::RedirectToFacade { facade } = &rule.action {
                if !seen.contains(facade.as_str()) {
                    return Err(RulesetError::UnknownFacade {
                        rule: rule.id.clone(),
                        facade: facade.as_str().to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            host = %self.host.version,
            rules = self.rules.len(),
            facades = self.facades.len(),
            api_types = api.type_count(),
            "ruleset compiled"
        );

        Ok(CompiledRuleset {
            host: self.host,
            registry: RuleRegistry::new(self.rules, self.guidance),
            facades: FacadeProvider::new(self.facades),
            api,
        })
    }
}

/// The read-only lookup structures the pipeline shares
#[derive(Debug, Clone)]
pub struct CompiledRuleset {
    /// Host release identity
    pub host: HostInfo,

    /// Rewrite rules + field guidance
    pub registry: RuleRegistry,

    /// Facade descriptors
    pub facades: FacadeProvider,

    /// Current API surface
    pub api: HostApiTable,
}

/// Ruleset loading errors
#[derive(Debug, thiserror::Error)]
pub enum RulesetError {
    #[error("failed to read ruleset {0}: {1}")]
    Io(String, String),

    #[error("failed to parse ruleset: {0}")]
    Parse(String),

    #[error("rule '{rule}' redirects to unknown facade '{facade}'")]
    UnknownFacade { rule: String, facade: String },

    #[error("duplicate facade id '{facade}'")]
    DuplicateFacade { facade: String },

    #[error("facade '{facade}' entry {member} does not belong to the fronted type")]
    FacadeEntryMismatch { facade: String, member: String },

    #[error("facade '{facade}' forwards to {target}, which the host API does not export")]
    FacadeTargetMissing { facade: String, target: String },
}
