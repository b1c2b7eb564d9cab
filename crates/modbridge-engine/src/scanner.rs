//! Reference scanner
//!
//! Pure read pass over a decoded module image: every external reference is
//! canonicalized to a symbol identity and classified against the rule
//! registry and the host API surface. Type references are resolved before
//! member references, because a member's canonical identity includes its
//! declaring type - a type-level redirect changes which member rule
//! subsequently matches.

use modbridge_core::identity::{SymbolIdentity, TypeIdentity};
use modbridge_core::version::HostVersion;
use modbridge_image::{ImageError, MemberRefId, ModuleImage, TypeRefId};
use modbridge_rules::{FacadeProvider, HostApiTable, RewriteAction, RuleRegistry};

/// Where in the image a reference lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefSite {
    /// Row in the type-ref table
    Type(TypeRefId),

    /// Row in the member-ref table
    Member(MemberRefId),
}

impl std::fmt::Display for RefSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Type(id) => write!(f, "type-ref #{}", id.0),
            Self::Member(id) => write!(f, "member-ref #{}", id.0),
        }
    }
}

/// Classification of one scanned reference
#[derive(Debug, Clone, PartialEq)]
pub enum RefStatus {
    /// A rule governs this reference
    Matched {
        /// Id of the winning rule
        rule_id: String,

        /// The rule's action, resolved at scan time
        action: RewriteAction,
    },

    /// No rule, but the current host (or a registered facade) exports the
    /// symbol - nothing to do
    ResolvesInHost,

    /// No rule, no facade, not in the host API: the module cannot load
    Unresolved,
}

/// One scanned reference
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedReference {
    /// Reference site
    pub site: RefSite,

    /// Canonical identity (member identities use the post-type-rule
    /// declaring type)
    pub identity: SymbolIdentity,

    /// Classification
    pub status: RefStatus,
}

/// Ordered scan of one module: type references first, then members
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    /// Module name, as declared in the image
    pub module: String,

    /// References in scan order
    pub references: Vec<ScannedReference>,
}

impl ScanResult {
    /// References that neither matched a rule nor resolve in the host
    pub fn unresolved(&self) -> impl Iterator<Item = &ScannedReference> {
        self.references
            .iter()
            .filter(|r| r.status == RefStatus::Unresolved)
    }

    /// Whether any reference matched an active rule
    pub fn has_matches(&self) -> bool {
        self.references
            .iter()
            .any(|r| matches!(r.status, RefStatus::Matched { .. }))
    }
}

/// The scanner, borrowing the run's shared read-only lookup structures
pub struct Scanner<'a> {
    registry: &'a RuleRegistry,
    facades: &'a FacadeProvider,
    api: &'a HostApiTable,
    host_version: HostVersion,
}

impl<'a> Scanner<'a> {
    /// Create a scanner for the given host version
    pub fn new(
        registry: &'a RuleRegistry,
        facades: &'a FacadeProvider,
        api: &'a HostApiTable,
        host_version: HostVersion,
    ) -> Self {
        Self {
            registry,
            facades,
            api,
            host_version,
        }
    }

    /// Scan a module image.
    ///
    /// Fails only on image corruption (dangling table indices); unresolved
    /// symbols are a scan *result*, not a scan error.
    pub fn scan(&self, image: &ModuleImage) -> Result<ScanResult, ImageError> {
        let mut references =
            Vec::with_capacity(image.type_refs.len() + image.member_refs.len());

        // Pass 1: type references. Record the effective (post-rule)
        // identity of each so member canonicalization sees redirects.
        let mut effective_types = Vec::with_capacity(image.type_refs.len());
        for idx in 0..image.type_refs.len() {
            let id = TypeRefId(idx as u32);
            let identity = image.type_identity(id)?;
            let symbol = SymbolIdentity::Type(identity.clone());

            let (status, effective) = match self.registry.lookup(&symbol, &self.host_version) {
                Some(rule) => {
                    let effective = match &rule.action {
                        RewriteAction::Redirect {
                            to: SymbolIdentity::Type(t),
                        } => t.clone(),
                        RewriteAction::RedirectToFacade { facade } => self
                            .facades
                            .resolve(facade)
                            .map(|d| d.facade_type.clone())
                            .unwrap_or_else(|_| identity.clone()),
                        _ => identity.clone(),
                    };
                    (
                        RefStatus::Matched {
                            rule_id: rule.id.clone(),
                            action: rule.action.clone(),
                        },
                        effective,
                    )
                }
                None => {
                    let status = if self.resolves_type(&identity) {
                        RefStatus::ResolvesInHost
                    } else {
                        RefStatus::Unresolved
                    };
                    (status, identity.clone())
                }
            };

            effective_types.push(effective);
            references.push(ScannedReference {
                site: RefSite::Type(id),
                identity: symbol,
                status,
            });
        }

        // Pass 2: member references, canonicalized against the effective
        // declaring type.
        for idx in 0..image.member_refs.len() {
            let id = MemberRefId(idx as u32);
            let row = image.member_ref(id)?;
            let declaring = effective_types
                .get(row.parent.0 as usize)
                .cloned()
                .ok_or(ImageError::TypeRefOutOfRange(row.parent.0))?;
            let identity = image.member_identity_with_declaring(id, declaring)?;
            let symbol = SymbolIdentity::Member(identity.clone());

            let status = match self.registry.lookup(&symbol, &self.host_version) {
                Some(rule) => RefStatus::Matched {
                    rule_id: rule.id.clone(),
                    action: rule.action.clone(),
                },
                None => {
                    if self.api.resolves_member(&identity) || self.facades.owns_member(&identity) {
                        RefStatus::ResolvesInHost
                    } else {
                        RefStatus::Unresolved
                    }
                }
            };

            references.push(ScannedReference {
                site: RefSite::Member(id),
                identity: symbol,
                status,
            });
        }

        Ok(ScanResult {
            module: image.name.clone(),
            references,
        })
    }

    fn resolves_type(&self, identity: &TypeIdentity) -> bool {
        self.api.resolves_type(identity) || self.facades.owns_type(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbridge_image::ImageBuilder;
    use modbridge_rules::{RewriteRule, SymbolPattern};
    use modbridge_core::identity::MemberIdentity;
    use modbridge_core::version::VersionRange;

    fn host_version() -> HostVersion {
        "1.6.0".parse().unwrap()
    }

    fn item() -> TypeIdentity {
        TypeIdentity::new("Host", "StardewValley", "Item")
    }

    fn api_with_item() -> HostApiTable {
        let mut api = HostApiTable::new();
        api.add_type(&item());
        api
    }

    #[test]
    fn scan_is_ordered_types_then_members() {
        let mut b = ImageBuilder::new("Mod", "1.0.0");
        let t = b.type_ref("Host", "StardewValley", "Item");
        b.field_ref(t, "category", "int");
        let image = b.build();

        let registry = RuleRegistry::default();
        let facades = FacadeProvider::default();
        let api = api_with_item();
        let scanner = Scanner::new(&registry, &facades, &api, host_version());
        let scan = scanner.scan(&image).unwrap();

        assert_eq!(scan.references.len(), 2);
        assert!(matches!(scan.references[0].site, RefSite::Type(_)));
        assert!(matches!(scan.references[1].site, RefSite::Member(_)));
    }

    #[test]
    fn type_redirect_changes_member_canonical_identity() {
        // The member ref is parented on the *old* type; its canonical
        // identity must already use the redirected declaring type.
        let mut b = ImageBuilder::new("Mod", "1.0.0");
        let old = b.type_ref("Host", "StardewValley", "SObject");
        b.field_ref(old, "category", "int");
        let image = b.build();

        let registry = RuleRegistry::new(
            vec![RewriteRule {
                id: "sobject-to-item".into(),
                pattern: SymbolPattern::Exact {
                    symbol: TypeIdentity::new("Host", "StardewValley", "SObject").into(),
                },
                action: modbridge_rules::RewriteAction::Redirect { to: item().into() },
                applies: VersionRange::any(),
            }],
            vec![],
        );
        let facades = FacadeProvider::default();
        let api = api_with_item();
        let scanner = Scanner::new(&registry, &facades, &api, host_version());
        let scan = scanner.scan(&image).unwrap();

        let member = &scan.references[1];
        let expected: SymbolIdentity = MemberIdentity::field(item(), "category", "int").into();
        assert_eq!(member.identity, expected);
    }

    #[test]
    fn unknown_symbol_is_unresolved_not_an_error() {
        let mut b = ImageBuilder::new("Mod", "1.0.0");
        b.type_ref("Host", "StardewValley", "RemovedType");
        let image = b.build();

        let registry = RuleRegistry::default();
        let facades = FacadeProvider::default();
        let api = api_with_item();
        let scanner = Scanner::new(&registry, &facades, &api, host_version());
        let scan = scanner.scan(&image).unwrap();

        assert_eq!(scan.unresolved().count(), 1);
    }

    #[test]
    fn dangling_index_is_a_scan_error() {
        let mut b = ImageBuilder::new("Mod", "1.0.0");
        let t = b.type_ref("Host", "StardewValley", "Item");
        b.field_ref(t, "category", "int");
        let mut image = b.build();
        // Corrupt the member's parent to point past the type table.
        image.member_refs[0].parent = TypeRefId(42);

        let registry = RuleRegistry::default();
        let facades = FacadeProvider::default();
        let api = api_with_item();
        let scanner = Scanner::new(&registry, &facades, &api, host_version());
        assert!(scanner.scan(&image).is_err());
    }
}
