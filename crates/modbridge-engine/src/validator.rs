//! Post-rewrite structural validation
//!
//! Confirms a rewritten image is still well-formed: every table index in
//! range, every remaining reference resolvable against the host API or a
//! registered facade, and no reference still matching an active rule.
//! Findings here mean the rule set produced a bad image, so they feed the
//! internal-defect rejection path rather than the incompatibility one.

use modbridge_core::identity::SymbolIdentity;
use modbridge_core::version::HostVersion;
use modbridge_image::{MemberRefId, ModuleImage, TypeRefId};
use modbridge_rules::{FacadeProvider, HostApiTable, RuleRegistry};

/// Validate a rewritten image. Returns human-readable findings; empty
/// means the image is load-ready.
pub fn validate(
    image: &ModuleImage,
    registry: &RuleRegistry,
    facades: &FacadeProvider,
    api: &HostApiTable,
    host_version: &HostVersion,
) -> Vec<String> {
    let mut findings = Vec::new();

    for idx in 0..image.type_refs.len() {
        let id = TypeRefId(idx as u32);
        match image.type_identity(id) {
            Ok(identity) => {
                if !api.resolves_type(&identity) && !facades.owns_type(&identity) {
                    findings.push(format!("type-ref #{idx} ({identity}) does not resolve"));
                }
                if let Some(rule) = registry.lookup(&SymbolIdentity::Type(identity), host_version) {
                    findings.push(format!(
                        "type-ref #{idx} still matches active rule '{}'",
                        rule.id
                    ));
                }
            }
            Err(e) => findings.push(format!("type-ref #{idx}: {e}")),
        }
    }

    for idx in 0..image.member_refs.len() {
        let id = MemberRefId(idx as u32);
        match image.member_identity(id) {
            Ok(identity) => {
                if !api.resolves_member(&identity) && !facades.owns_member(&identity) {
                    findings.push(format!("member-ref #{idx} ({identity}) does not resolve"));
                }
                if let Some(rule) =
                    registry.lookup(&SymbolIdentity::Member(identity), host_version)
                {
                    findings.push(format!(
                        "member-ref #{idx} still matches active rule '{}'",
                        rule.id
                    ));
                }
            }
            Err(e) => findings.push(format!("member-ref #{idx}: {e}")),
        }
    }

    for (m_idx, method) in image.methods.iter().enumerate() {
        if image.strings.get(method.name).is_none() {
            findings.push(format!("method #{m_idx} has a dangling name index"));
        }
        for (i_idx, instr) in method.body.iter().enumerate() {
            if let Some(m) = instr.member_operand() {
                if m.0 as usize >= image.member_refs.len() {
                    findings.push(format!(
                        "method #{m_idx} instruction #{i_idx} references dangling member ref #{}",
                        m.0
                    ));
                }
            }
            if let Some(t) = instr.type_operand() {
                if t.0 as usize >= image.type_refs.len() {
                    findings.push(format!(
                        "method #{m_idx} instruction #{i_idx} references dangling type ref #{}",
                        t.0
                    ));
                }
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbridge_core::identity::{MemberKind, TypeIdentity};
    use modbridge_image::{ImageBuilder, Instr};
    use modbridge_rules::{ApiMember, HostApiTable};

    fn api() -> HostApiTable {
        let mut api = HostApiTable::new();
        let item = TypeIdentity::new("Host", "StardewValley", "Item");
        api.add_member(
            &item,
            ApiMember {
                kind: MemberKind::Method,
                name: "get_Category".into(),
                params: vec![],
                returns: "int".into(),
            },
        );
        api
    }

    #[test]
    fn clean_image_validates() {
        let mut b = ImageBuilder::new("Mod", "1.0.0");
        let item = b.type_ref("Host", "StardewValley", "Item");
        let get = b.method_ref(item, "get_Category", vec![], "int");
        b.method("Entry", vec![Instr::Call(get), Instr::Ret]);
        let image = b.build();

        let findings = validate(
            &image,
            &RuleRegistry::default(),
            &FacadeProvider::default(),
            &api(),
            &"1.6.0".parse().unwrap(),
        );
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn unresolvable_member_is_a_finding() {
        let mut b = ImageBuilder::new("Mod", "1.0.0");
        let item = b.type_ref("Host", "StardewValley", "Item");
        b.field_ref(item, "vanished", "int");
        let image = b.build();

        let findings = validate(
            &image,
            &RuleRegistry::default(),
            &FacadeProvider::default(),
            &api(),
            &"1.6.0".parse().unwrap(),
        );
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("vanished"));
    }

    #[test]
    fn dangling_instruction_operand_is_a_finding() {
        let mut b = ImageBuilder::new("Mod", "1.0.0");
        b.method("Entry", vec![Instr::Call(MemberRefId(9)), Instr::Ret]);
        let image = b.build();

        let findings = validate(
            &image,
            &RuleRegistry::default(),
            &FacadeProvider::default(),
            &api(),
            &"1.6.0".parse().unwrap(),
        );
        assert!(findings.iter().any(|f| f.contains("dangling member ref #9")));
    }
}
