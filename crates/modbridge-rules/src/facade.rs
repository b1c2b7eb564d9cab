//! Facade provider and forwarding shims
//!
//! A facade preserves an old member's calling convention while forwarding
//! to the current host API. Facades are dispatch tables, not subclasses:
//! each descriptor maps old member signatures to current host members, and
//! the rewriter rebinds call sites to the facade's synthesized forwarding
//! member.
//!
//! A facade is never a real value. A shim must be attached to a live host
//! instance before it can forward anything; attaching one detached fails
//! immediately, because it means the rewriter produced an incorrect
//! binding, not that a mod misbehaved.

use modbridge_core::identity::{MemberIdentity, MemberKind, TypeIdentity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU64;

/// Identifier of a registered facade
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacadeId(String);

impl FacadeId {
    /// Create a facade id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FacadeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One dispatch-table entry: old signature in, current host member out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingEntry {
    /// The member as old mods reference it
    pub old: MemberIdentity,

    /// The live host member the facade forwards to
    pub target: MemberIdentity,
}

/// A synthesized compatibility facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacadeDescriptor {
    /// Facade id, referenced by rewrite rules
    pub id: FacadeId,

    /// The synthesized facade type the rewritten image will reference
    pub facade_type: TypeIdentity,

    /// The host type the facade stands in for
    pub fronts: TypeIdentity,

    /// Dispatch table, old signature to current member
    pub entries: Vec<ForwardingEntry>,
}

impl FacadeDescriptor {
    /// Dispatch-table entry for an old member identity, if any
    pub fn entry_for(&self, old: &MemberIdentity) -> Option<&ForwardingEntry> {
        self.entries.iter().find(|e| e.old == *old)
    }

    /// Identity of the synthesized forwarding member a rewritten image
    /// should reference for this entry. Always a method on the facade
    /// type, keeping the old name and signature.
    pub fn forwarding_member(&self, entry: &ForwardingEntry) -> MemberIdentity {
        MemberIdentity::new(
            self.facade_type.clone(),
            MemberKind::Method,
            entry.old.name.clone(),
            entry.old.signature.clone(),
        )
    }

    /// Whether the given member identity is one of this facade's
    /// synthesized forwarding members
    pub fn owns_member(&self, member: &MemberIdentity) -> bool {
        member.declaring == self.facade_type
            && member.kind == MemberKind::Method
            && self
                .entries
                .iter()
                .any(|e| e.old.name == member.name && e.old.signature == member.signature)
    }
}

/// Read-only facade lookup, built once at startup
#[derive(Debug, Clone, Default)]
pub struct FacadeProvider {
    facades: HashMap<String, FacadeDescriptor>,
}

impl FacadeProvider {
    /// Build a provider from descriptors
    pub fn new(descriptors: Vec<FacadeDescriptor>) -> Self {
        let facades = descriptors
            .into_iter()
            .map(|d| (d.id.as_str().to_string(), d))
            .collect();
        Self { facades }
    }

    /// Resolve a facade id
    pub fn resolve(&self, id: &FacadeId) -> Result<&FacadeDescriptor, FacadeError> {
        self.facades
            .get(id.as_str())
            .ok_or_else(|| FacadeError::UnknownFacade { facade: id.clone() })
    }

    /// Number of registered facades
    pub fn len(&self) -> usize {
        self.facades.len()
    }

    /// Whether no facades are registered
    pub fn is_empty(&self) -> bool {
        self.facades.is_empty()
    }

    /// Whether a type identity names a registered facade type
    pub fn owns_type(&self, t: &TypeIdentity) -> bool {
        self.facades.values().any(|d| d.facade_type == *t)
    }

    /// Whether a member identity names a registered forwarding member
    pub fn owns_member(&self, member: &MemberIdentity) -> bool {
        self.facades.values().any(|d| d.owns_member(member))
    }

    /// Iterate descriptors
    pub fn iter(&self) -> impl Iterator<Item = &FacadeDescriptor> {
        self.facades.values()
    }
}

/// Proof of a live host instance a shim forwards through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBinding {
    instance: NonZeroU64,
}

impl HostBinding {
    /// Bind to a host instance handle; zero is not a live instance
    pub fn new(instance: u64) -> Option<Self> {
        NonZeroU64::new(instance).map(|instance| Self { instance })
    }

    /// The raw instance handle
    pub fn instance(&self) -> u64 {
        self.instance.get()
    }
}

/// A facade shim bound to a live host instance.
///
/// The only way to get one is [`FacadeShim::attach`] with a binding;
/// there is no detached constructor by design.
#[derive(Debug)]
pub struct FacadeShim<'a> {
    descriptor: &'a FacadeDescriptor,
    binding: HostBinding,
}

impl<'a> FacadeShim<'a> {
    /// Attach a shim to a host instance.
    ///
    /// `binding: None` means something constructed the facade standalone,
    /// which is a rewriter defect; it fails immediately and loudly rather
    /// than producing confusing downstream behavior.
    pub fn attach(
        descriptor: &'a FacadeDescriptor,
        binding: Option<HostBinding>,
    ) -> Result<Self, FacadeError> {
        match binding {
            Some(binding) => Ok(Self { descriptor, binding }),
            None => Err(FacadeError::ConstructedStandalone {
                facade: descriptor.id.clone(),
            }),
        }
    }

    /// The descriptor this shim dispatches through
    pub fn descriptor(&self) -> &FacadeDescriptor {
        self.descriptor
    }

    /// The bound host instance
    pub fn binding(&self) -> HostBinding {
        self.binding
    }

    /// Resolve an old member through the dispatch table
    pub fn forward(&self, old: &MemberIdentity) -> Result<&MemberIdentity, FacadeError> {
        self.descriptor
            .entry_for(old)
            .map(|e| &e.target)
            .ok_or_else(|| FacadeError::NoForwarding {
                facade: self.descriptor.id.clone(),
                member: old.to_string(),
            })
    }
}

/// Facade resolution and misuse errors
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error("no facade registered with id '{facade}'")]
    UnknownFacade { facade: FacadeId },

    #[error(
        "facade '{facade}' was constructed as a standalone instance; \
         facades only intercept and forward calls for a live host object"
    )]
    ConstructedStandalone { facade: FacadeId },

    #[error("facade '{facade}' has no forwarding entry for {member}")]
    NoForwarding { facade: FacadeId, member: String },
}

impl FacadeError {
    /// Stable diagnostic code for reporting this failure.
    ///
    /// Standalone construction gets its own code so the host runtime can
    /// surface it distinctly; the other variants are rule-set defects.
    pub fn diagnostic_code(&self) -> modbridge_core::DiagnosticCode {
        match self {
            Self::ConstructedStandalone { .. } => modbridge_core::DiagnosticCode::FacadeMisuse,
            Self::UnknownFacade { .. } | Self::NoForwarding { .. } => {
                modbridge_core::DiagnosticCode::RewriteValidationFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbridge_core::identity::Signature;

    fn item_category_facade() -> FacadeDescriptor {
        let item = TypeIdentity::new("Host", "StardewValley", "Item");
        FacadeDescriptor {
            id: FacadeId::new("ItemCategoryFacade"),
            facade_type: TypeIdentity::new("Modbridge.Facades", "Modbridge.Facades", "ItemCategoryFacade"),
            fronts: item.clone(),
            entries: vec![ForwardingEntry {
                old: MemberIdentity::field(item.clone(), "Category", "int"),
                target: MemberIdentity::method(item, "get_Category", vec![], "int"),
            }],
        }
    }

    #[test]
    fn provider_resolves_registered_facades() {
        let provider = FacadeProvider::new(vec![item_category_facade()]);
        assert!(provider.resolve(&FacadeId::new("ItemCategoryFacade")).is_ok());
        assert!(matches!(
            provider.resolve(&FacadeId::new("Missing")),
            Err(FacadeError::UnknownFacade { .. })
        ));
    }

    #[test]
    fn standalone_construction_fails_immediately() {
        let descriptor = item_category_facade();
        let err = FacadeShim::attach(&descriptor, None).unwrap_err();
        assert!(matches!(err, FacadeError::ConstructedStandalone { .. }));
        assert!(err.to_string().contains("standalone"));
        assert_eq!(
            err.diagnostic_code(),
            modbridge_core::DiagnosticCode::FacadeMisuse
        );
    }

    #[test]
    fn bound_shim_forwards_through_dispatch_table() {
        let descriptor = item_category_facade();
        let shim = FacadeShim::attach(&descriptor, HostBinding::new(0x1000)).unwrap();

        let item = TypeIdentity::new("Host", "StardewValley", "Item");
        let old = MemberIdentity::field(item, "Category", "int");
        let target = shim.forward(&old).unwrap();
        assert_eq!(target.name, "get_Category");
    }

    #[test]
    fn forwarding_unknown_member_fails() {
        let descriptor = item_category_facade();
        let shim = FacadeShim::attach(&descriptor, HostBinding::new(1)).unwrap();

        let item = TypeIdentity::new("Host", "StardewValley", "Item");
        let old = MemberIdentity::field(item, "Stack", "int");
        assert!(matches!(shim.forward(&old), Err(FacadeError::NoForwarding { .. })));
    }

    #[test]
    fn zero_is_not_a_live_instance() {
        assert!(HostBinding::new(0).is_none());
        assert!(HostBinding::new(7).is_some());
    }

    #[test]
    fn forwarding_member_keeps_old_shape() {
        let descriptor = item_category_facade();
        let entry = &descriptor.entries[0];
        let member = descriptor.forwarding_member(entry);
        assert_eq!(member.declaring, descriptor.facade_type);
        assert_eq!(member.kind, MemberKind::Method);
        assert_eq!(member.name, "Category");
        assert_eq!(member.signature, Signature::field("int"));
        assert!(descriptor.owns_member(&member));
    }
}
