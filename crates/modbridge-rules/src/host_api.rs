//! Current host API surface table
//!
//! The set of types and members the current host version actually exports.
//! A reference that matches no rule is healthy only if it resolves here;
//! the post-rewrite validator holds every remaining reference against this
//! table.

use modbridge_core::identity::{MemberIdentity, MemberKind, TypeIdentity};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One exported member of a host type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMember {
    /// Field or method
    pub kind: MemberKind,

    /// Member name
    pub name: String,

    /// Parameter shapes
    #[serde(default)]
    pub params: Vec<String>,

    /// Return shape
    pub returns: String,
}

impl ApiMember {
    fn matches(&self, member: &MemberIdentity) -> bool {
        self.kind == member.kind
            && self.name == member.name
            && self.params == member.signature.params
            && self.returns == member.signature.returns
    }
}

/// The host's exported API surface, keyed by type identity display form
#[derive(Debug, Clone, Default)]
pub struct HostApiTable {
    types: HashSet<String>,
    members: HashMap<String, Vec<ApiMember>>,
}

impl HostApiTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exported type
    pub fn add_type(&mut self, t: &TypeIdentity) {
        self.types.insert(t.to_string());
    }

    /// Register an exported member on its declaring type
    pub fn add_member(&mut self, t: &TypeIdentity, member: ApiMember) {
        self.types.insert(t.to_string());
        self.members.entry(t.to_string()).or_default().push(member);
    }

    /// Whether the host exports this type
    pub fn resolves_type(&self, t: &TypeIdentity) -> bool {
        self.types.contains(&t.to_string())
    }

    /// Whether the host exports this exact member (kind, name, signature)
    pub fn resolves_member(&self, member: &MemberIdentity) -> bool {
        self.members
            .get(&member.declaring.to_string())
            .map(|members| members.iter().any(|m| m.matches(member)))
            .unwrap_or(false)
    }

    /// Whether the declaring type has any member of this name, regardless
    /// of kind or signature. Feeds "the signature changed" suggestions.
    pub fn member_with_name_exists(&self, t: &TypeIdentity, name: &str) -> bool {
        self.members
            .get(&t.to_string())
            .map(|members| members.iter().any(|m| m.name == name))
            .unwrap_or(false)
    }

    /// Number of exported types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> TypeIdentity {
        TypeIdentity::new("Host", "StardewValley", "Item")
    }

    fn table() -> HostApiTable {
        let mut t = HostApiTable::new();
        t.add_member(
            &item(),
            ApiMember {
                kind: MemberKind::Method,
                name: "get_Category".into(),
                params: vec![],
                returns: "int".into(),
            },
        );
        t
    }

    #[test]
    fn resolves_exact_member() {
        let t = table();
        let m = MemberIdentity::method(item(), "get_Category", vec![], "int");
        assert!(t.resolves_member(&m));
        assert!(t.resolves_type(&item()));
    }

    #[test]
    fn signature_mismatch_does_not_resolve() {
        let t = table();
        let m = MemberIdentity::method(item(), "get_Category", vec!["bool".into()], "int");
        assert!(!t.resolves_member(&m));
        assert!(t.member_with_name_exists(&item(), "get_Category"));
    }

    #[test]
    fn unknown_type_resolves_nothing() {
        let t = table();
        let ghost = TypeIdentity::new("Host", "StardewValley", "Ghost");
        assert!(!t.resolves_type(&ghost));
        assert!(!t.member_with_name_exists(&ghost, "anything"));
    }
}
