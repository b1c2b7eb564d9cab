//! Versioned rewrite-rule registry
//!
//! Pure lookup structure: rules are registered once, in order, and the
//! registry is read-only for the rest of the run. Matching precedence:
//! an exact-signature rule beats a pattern rule; among pattern rules the
//! narrowest applicable version range wins; rules of equal specificity
//! resolve to the first registered, logged at debug for rule maintainers.

use crate::facade::FacadeId;
use modbridge_core::identity::SymbolIdentity;
use modbridge_core::version::{HostVersion, VersionRange};
use serde::{Deserialize, Serialize};

/// What to do with a matched reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RewriteAction {
    /// Drop the reference; it must be unused once rewriting completes
    Remove,

    /// Retarget the reference to a current symbol
    Redirect { to: SymbolIdentity },

    /// Rebind call sites to a forwarding facade
    RedirectToFacade { facade: FacadeId },
}

/// What a rule matches against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum SymbolPattern {
    /// Full identity match, signature included
    Exact { symbol: SymbolIdentity },

    /// Name-based match with `*` wildcards per segment. `member: None`
    /// matches type references only; `member: Some(..)` matches member
    /// references of that name regardless of signature.
    Name {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        module: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member: Option<String>,
    },
}

impl SymbolPattern {
    /// Whether this is an exact-signature pattern
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact { .. })
    }

    /// Whether the pattern matches the given identity
    pub fn matches(&self, identity: &SymbolIdentity) -> bool {
        match self {
            Self::Exact { symbol } => symbol == identity,
            Self::Name {
                module,
                namespace,
                type_name,
                member,
            } => {
                let type_id = identity.type_identity();
                if let Some(module) = module {
                    if !wildcard_match(module, &type_id.module) {
                        return false;
                    }
                }
                if let Some(namespace) = namespace {
                    if !wildcard_match(namespace, &type_id.namespace) {
                        return false;
                    }
                }
                if !wildcard_match(type_name, &type_id.name) {
                    return false;
                }
                match (member, identity.member_name()) {
                    (None, None) => true,
                    (Some(pattern), Some(name)) => wildcard_match(pattern, name),
                    _ => false,
                }
            }
        }
    }
}

/// A single versioned rewrite rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewriteRule {
    /// Stable rule id, for logs and conflict reports
    pub id: String,

    /// What the rule matches
    pub pattern: SymbolPattern,

    /// What happens to a matched reference
    #[serde(flatten)]
    pub action: RewriteAction,

    /// Host versions the rule applies to
    #[serde(default)]
    pub applies: VersionRange,
}

/// Kind of risky-field guidance shared with the build-time analyzer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuidanceKind {
    /// A live-synced wrapper field; direct access desyncs in multiplayer
    NetField {
        /// Wrapper type name shown in messages, e.g. `NetInt`
        wrapper: String,

        /// Collection-shaped wrappers are safe to consume through general
        /// collection interfaces
        #[serde(default)]
        collection: bool,
    },

    /// A field the host has replaced outright
    ObsoleteField,
}

/// Guidance entry for one risky host field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGuidance {
    /// Namespace-qualified declaring type, e.g. `StardewValley.Item`
    #[serde(rename = "type")]
    pub type_name: String,

    /// Field name as mods reference it
    pub field: String,

    /// What makes the field risky
    #[serde(flatten)]
    pub kind: GuidanceKind,

    /// The safe replacement member
    pub replacement: String,
}

/// The read-only rule registry
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<RewriteRule>,
    guidance: Vec<FieldGuidance>,
}

impl RuleRegistry {
    /// Build a registry from its registration-ordered parts
    pub fn new(rules: Vec<RewriteRule>, guidance: Vec<FieldGuidance>) -> Self {
        Self { rules, guidance }
    }

    /// All rules, in registration order
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// All field guidance entries
    pub fn guidance(&self) -> &[FieldGuidance] {
        &self.guidance
    }

    /// Find the rule governing a reference under the given host version.
    ///
    /// Returns `None` when no applicable rule matches. Ties between
    /// equally specific rules resolve to the first registered; the tie is
    /// logged, not surfaced as an error.
    pub fn lookup(&self, identity: &SymbolIdentity, host_version: &HostVersion) -> Option<&RewriteRule> {
        let mut best: Option<&RewriteRule> = None;

        for rule in &self.rules {
            if !rule.applies.contains(host_version) || !rule.pattern.matches(identity) {
                continue;
            }

            match best {
                None => best = Some(rule),
                Some(current) => {
                    if rule_beats(rule, current) {
                        best = Some(rule);
                    } else if !rule_beats(current, rule) {
                        // Equal specificity: first registered wins.
                        tracing::debug!(
                            kept = %current.id,
                            ignored = %rule.id,
                            symbol = %identity,
                            "rule conflict resolved by registration order"
                        );
                    }
                }
            }
        }

        best
    }

    /// Like [`lookup`](Self::lookup) but ignoring the version gate.
    ///
    /// Used to derive "a rule exists for other host versions" suggestions
    /// for references that stay unresolved under the current version.
    pub fn near_match(&self, identity: &SymbolIdentity) -> Option<&RewriteRule> {
        let mut best: Option<&RewriteRule> = None;
        for rule in &self.rules {
            if !rule.pattern.matches(identity) {
                continue;
            }
            match best {
                None => best = Some(rule),
                Some(current) if rule_beats(rule, current) => best = Some(rule),
                Some(_) => {}
            }
        }
        best
    }

    /// Guidance for a risky field, keyed by qualified type name + field
    pub fn field_guidance(&self, type_name: &str, field: &str) -> Option<&FieldGuidance> {
        self.guidance
            .iter()
            .find(|g| g.type_name == type_name && g.field == field)
    }
}

/// Whether `a` is strictly more specific than `b`
fn rule_beats(a: &RewriteRule, b: &RewriteRule) -> bool {
    match (a.pattern.is_exact(), b.pattern.is_exact()) {
        (true, false) => true,
        (false, true) => false,
        // Same pattern class: narrower version range wins.
        _ => a.applies.narrower_than(&b.applies),
    }
}

/// Glob-lite matching: a single `*` splits into prefix and suffix
fn wildcard_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];
        text.starts_with(prefix) && text.len() >= prefix.len() + suffix.len() && text.ends_with(suffix)
    } else {
        pattern == text
    }
}
