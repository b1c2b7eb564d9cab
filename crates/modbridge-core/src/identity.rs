//! Canonical symbol identities
//!
//! A symbol identity describes a type, method, or field referenced across
//! module boundaries. Identities deliberately carry the declaring module's
//! *name only* - never its version - so that the same reference matches
//! across host releases.

use serde::{Deserialize, Serialize};

/// Kind of a referenced member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    /// A field access (load or store)
    Field,

    /// A method call (including property accessors)
    Method,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field => write!(f, "field"),
            Self::Method => write!(f, "method"),
        }
    }
}

/// Canonical identity of a referenced type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeIdentity {
    /// Name of the module declaring the type (no version component)
    pub module: String,

    /// Namespace the type lives in (may be empty)
    pub namespace: String,

    /// Simple type name
    pub name: String,
}

impl TypeIdentity {
    /// Create a type identity
    pub fn new(
        module: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace-qualified type name, e.g. `StardewValley.Item`
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl std::fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}!{}", self.module, self.full_name())
    }
}

/// Ordered parameter and return shapes of a member.
///
/// Shapes are plain type names; two members with the same name but
/// different shapes are distinct identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Signature {
    /// Parameter shapes, in declaration order
    pub params: Vec<String>,

    /// Return shape (`void` for none)
    pub returns: String,
}

impl Signature {
    /// Create a signature from parameter shapes and a return shape
    pub fn new(params: Vec<String>, returns: impl Into<String>) -> Self {
        Self {
            params,
            returns: returns.into(),
        }
    }

    /// Signature of a field of the given shape
    pub fn field(shape: impl Into<String>) -> Self {
        Self {
            params: Vec::new(),
            returns: shape.into(),
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) -> {}", self.params.join(", "), self.returns)
    }
}

/// Canonical identity of a referenced member (field or method)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberIdentity {
    /// Type declaring the member
    pub declaring: TypeIdentity,

    /// Field or method
    pub kind: MemberKind,

    /// Member name
    pub name: String,

    /// Member signature
    pub signature: Signature,
}

impl MemberIdentity {
    /// Create a member identity
    pub fn new(
        declaring: TypeIdentity,
        kind: MemberKind,
        name: impl Into<String>,
        signature: Signature,
    ) -> Self {
        Self {
            declaring,
            kind,
            name: name.into(),
            signature,
        }
    }

    /// A field member identity
    pub fn field(declaring: TypeIdentity, name: impl Into<String>, shape: impl Into<String>) -> Self {
        Self::new(declaring, MemberKind::Field, name, Signature::field(shape))
    }

    /// A method member identity
    pub fn method(
        declaring: TypeIdentity,
        name: impl Into<String>,
        params: Vec<String>,
        returns: impl Into<String>,
    ) -> Self {
        Self::new(declaring, MemberKind::Method, name, Signature::new(params, returns))
    }
}

impl std::fmt::Display for MemberIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{} {}", self.declaring, self.name, self.signature)
    }
}

/// A referenced symbol: a type or one of its members
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "symbol", rename_all = "lowercase")]
pub enum SymbolIdentity {
    Type(TypeIdentity),
    Member(MemberIdentity),
}

impl SymbolIdentity {
    /// The type portion of the identity: the type itself, or the member's
    /// declaring type.
    pub fn type_identity(&self) -> &TypeIdentity {
        match self {
            Self::Type(t) => t,
            Self::Member(m) => &m.declaring,
        }
    }

    /// Member name, if this is a member identity
    pub fn member_name(&self) -> Option<&str> {
        match self {
            Self::Type(_) => None,
            Self::Member(m) => Some(&m.name),
        }
    }
}

impl std::fmt::Display for SymbolIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Type(t) => write!(f, "{t}"),
            Self::Member(m) => write!(f, "{m}"),
        }
    }
}

impl From<TypeIdentity> for SymbolIdentity {
    fn from(t: TypeIdentity) -> Self {
        Self::Type(t)
    }
}

impl From<MemberIdentity> for SymbolIdentity {
    fn from(m: MemberIdentity) -> Self {
        Self::Member(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_full_name() {
        let t = TypeIdentity::new("Host", "StardewValley", "Item");
        assert_eq!(t.full_name(), "StardewValley.Item");
        assert_eq!(t.to_string(), "Host!StardewValley.Item");
    }

    #[test]
    fn empty_namespace() {
        let t = TypeIdentity::new("Host", "", "Game");
        assert_eq!(t.full_name(), "Game");
    }

    #[test]
    fn member_display() {
        let t = TypeIdentity::new("Host", "StardewValley", "Item");
        let m = MemberIdentity::method(t, "getCategory", vec![], "int");
        assert_eq!(m.to_string(), "Host!StardewValley.Item::getCategory () -> int");
    }

    #[test]
    fn identity_ignores_nothing_but_version() {
        // Same module name, different conceptual versions: identities are
        // equal because the version is not part of the identity at all.
        let a = TypeIdentity::new("Host", "StardewValley", "Item");
        let b = TypeIdentity::new("Host", "StardewValley", "Item");
        assert_eq!(a, b);
    }

    #[test]
    fn signatures_distinguish_members() {
        let t = TypeIdentity::new("Host", "StardewValley", "Item");
        let a = MemberIdentity::method(t.clone(), "salePrice", vec![], "int");
        let b = MemberIdentity::method(t, "salePrice", vec!["bool".into()], "int");
        assert_ne!(a, b);
    }
}
