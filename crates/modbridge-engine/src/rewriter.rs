//! Assembly rewriter
//!
//! Applies the actions a scan matched, mutating the in-memory metadata
//! image: retargeting references, rebinding call sites to facades, and
//! removing now-unused rows. Unresolved references reject the whole module
//! up front - a module with known-dangling references is never partially
//! loaded. After substitution the image goes through structural validation;
//! a validation failure is a defect in the rule set and is rejected under a
//! distinct kind so maintainers can tell it apart from an ordinary
//! incompatibility.

use crate::scanner::{RefSite, RefStatus, ScanResult};
use crate::validator;
use modbridge_core::identity::{MemberIdentity, MemberKind, SymbolIdentity, TypeIdentity};
use modbridge_core::report::{ModuleRejection, RejectionKind, UnresolvedReference};
use modbridge_core::version::HostVersion;
use modbridge_image::{
    write_image, Instr, MemberRefId, ModuleImage, TypeRefId, TypeRefRow,
};
use modbridge_rules::{FacadeProvider, HostApiTable, RewriteAction, RuleRegistry};
use std::collections::HashSet;

/// One substitution the rewriter performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRewrite {
    /// Id of the rule that fired
    pub rule_id: String,

    /// Reference site, in display form
    pub site: String,

    /// What happened at the site
    pub description: String,
}

/// A validated, load-ready module
#[derive(Debug, Clone)]
pub struct RewrittenModule {
    /// The rewritten image
    pub image: ModuleImage,

    /// Re-encoded bytes, ready to hand to the loader
    pub bytes: Vec<u8>,

    /// Substitutions performed, in scan order
    pub applied: Vec<AppliedRewrite>,

    /// SHA-256 of the *input* bytes
    pub fingerprint: String,
}

/// The rewriter, borrowing the run's shared read-only lookup structures
pub struct Rewriter<'a> {
    registry: &'a RuleRegistry,
    facades: &'a FacadeProvider,
    api: &'a HostApiTable,
    host_version: HostVersion,
}

impl<'a> Rewriter<'a> {
    /// Create a rewriter for the given host version
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

    /// Apply a scan's matched actions to the image.
    ///
    /// `fingerprint` is the SHA-256 of the input bytes, carried through to
    /// the verdict either way.
    pub fn rewrite(
        &self,
        mut image: ModuleImage,
        scan: &ScanResult,
        fingerprint: String,
    ) -> Result<RewrittenModule, ModuleRejection> {
        // Reject wholesale before touching anything: partial loads with
        // known-dangling references are never acceptable.
        let unresolved: Vec<UnresolvedReference> = scan
            .unresolved()
            .map(|r| {
                let mut entry = UnresolvedReference::new(
                    r.identity.to_string(),
                    "no rewrite rule matched and the current host does not export this symbol",
                );
                if let Some(suggestion) = self.suggest(&r.identity) {
                    entry = entry.with_suggestion(suggestion);
                }
                entry
            })
            .collect();
        if !unresolved.is_empty() {
            return Err(ModuleRejection::new(&scan.module, RejectionKind::Incompatible)
                .with_entries(unresolved)
                .with_fingerprint(fingerprint));
        }

        let mut applied = Vec::new();
        let mut removed_types: HashSet<u32> = HashSet::new();
        let mut removed_members: HashSet<u32> = HashSet::new();

        for reference in &scan.references {
            let RefStatus::Matched { rule_id, action } = &reference.status else {
                continue;
            };

            let description = self
                .apply_action(
                    &mut image,
                    reference.site,
                    &reference.identity,
                    action,
                    &mut removed_types,
                    &mut removed_members,
                )
                .map_err(|defect| {
                    internal_defect(&scan.module, &fingerprint, rule_id, &defect)
                })?;

            tracing::debug!(
                module = %scan.module,
                rule = %rule_id,
                site = %reference.site,
                "{description}"
            );
            applied.push(AppliedRewrite {
                rule_id: rule_id.clone(),
                site: reference.site.to_string(),
                description,
            });
        }

        if !removed_types.is_empty() || !removed_members.is_empty() {
            compact(&mut image, &removed_types, &removed_members)
                .map_err(|defect| internal_defect(&scan.module, &fingerprint, "remove", &defect))?;
        }

        let findings = validator::validate(
            &image,
            self.registry,
            self.facades,
            self.api,
            &self.host_version,
        );
        if !findings.is_empty() {
            return Err(ModuleRejection::new(&scan.module, RejectionKind::InternalValidation)
                .with_detail(findings.join("; "))
                .with_fingerprint(fingerprint));
        }

        let bytes = write_image(&image);
        Ok(RewrittenModule {
            image,
            bytes,
            applied,
            fingerprint,
        })
    }

    fn apply_action(
        &self,
        image: &mut ModuleImage,
        site: RefSite,
        identity: &SymbolIdentity,
        action: &RewriteAction,
        removed_types: &mut HashSet<u32>,
        removed_members: &mut HashSet<u32>,
    ) -> Result<String, String> {
        match (site, action) {
            (RefSite::Type(id), RewriteAction::Redirect { to: SymbolIdentity::Type(target) }) => {
                set_type_row(image, id, target);
                Ok(format!("redirected type to {target}"))
            }
            (RefSite::Type(id), RewriteAction::RedirectToFacade { facade }) => {
                let descriptor = self
                    .facades
                    .resolve(facade)
                    .map_err(|e| e.to_string())?;
                let target = descriptor.facade_type.clone();
                set_type_row(image, id, &target);
                Ok(format!("rebound type to facade {facade}"))
            }
            (RefSite::Type(id), RewriteAction::Remove) => {
                removed_types.insert(id.0);
                Ok("removed type reference".to_string())
            }
            (RefSite::Type(_), RewriteAction::Redirect { to }) => Err(format!(
                "type-level rule redirects to a member ({to})"
            )),
            (RefSite::Member(id), RewriteAction::Redirect { to: SymbolIdentity::Member(target) }) => {
                retarget_member(image, id, target);
                Ok(format!("redirected member to {target}"))
            }
            (RefSite::Member(id), RewriteAction::RedirectToFacade { facade }) => {
                let descriptor = self
                    .facades
                    .resolve(facade)
                    .map_err(|e| e.to_string())?;
                let SymbolIdentity::Member(old) = identity else {
                    return Err(format!("facade rule matched a non-member site for {facade}"));
                };
                let entry = descriptor.entry_for(old).ok_or_else(|| {
                    format!("facade {facade} has no forwarding entry for {old}")
                })?;
                let target = descriptor.forwarding_member(entry);
                retarget_member(image, id, &target);
                Ok(format!("rebound call site to facade {facade}"))
            }
            (RefSite::Member(id), RewriteAction::Remove) => {
                removed_members.insert(id.0);
                Ok("removed member reference".to_string())
            }
            (RefSite::Member(_), RewriteAction::Redirect { to }) => Err(format!(
                "member-level rule redirects to a type ({to})"
            )),
        }
    }

    /// Derive a user-facing suggestion for an unresolved reference
    fn suggest(&self, identity: &SymbolIdentity) -> Option<String> {
        if let Some(rule) = self.registry.near_match(identity) {
            return Some(format!(
                "a compatibility rule exists for host versions {}, but this host is {}; \
                 check for an updated ruleset or mod",
                rule.applies, self.host_version
            ));
        }
        if let SymbolIdentity::Member(m) = identity {
            if let Some(guidance) = self
                .registry
                .field_guidance(&m.declaring.full_name(), &m.name)
            {
                return Some(format!(
                    "use the {} member instead of the {} field",
                    guidance.replacement, m.name
                ));
            }
            if self.api.member_with_name_exists(&m.declaring, &m.name) {
                return Some(format!(
                    "the signature of {}.{} changed in this host version; rebuild against the current API",
                    m.declaring.full_name(),
                    m.name
                ));
            }
        }
        None
    }
}

fn internal_defect(
    module: &str,
    fingerprint: &str,
    rule_id: &str,
    defect: &str,
) -> ModuleRejection {
    tracing::warn!(module, rule = rule_id, defect, "rewrite produced an internal defect");
    ModuleRejection::new(module, RejectionKind::InternalValidation)
        .with_detail(format!("rule '{rule_id}': {defect}"))
        .with_fingerprint(fingerprint.to_string())
}

/// Overwrite a type-ref row with a new identity
fn set_type_row(image: &mut ModuleImage, id: TypeRefId, target: &TypeIdentity) {
    let module = image.strings.intern(&target.module);
    let namespace = image.strings.intern(&target.namespace);
    let name = image.strings.intern(&target.name);
    image.type_refs[id.0 as usize] = TypeRefRow {
        module,
        namespace,
        name,
    };
}

/// Find a type ref with the given identity, or append one
fn find_or_add_type_ref(image: &mut ModuleImage, target: &TypeIdentity) -> TypeRefId {
    for idx in 0..image.type_refs.len() {
        if let Ok(existing) = image.type_identity(TypeRefId(idx as u32)) {
            if existing == *target {
                return TypeRefId(idx as u32);
            }
        }
    }
    let module = image.strings.intern(&target.module);
    let namespace = image.strings.intern(&target.namespace);
    let name = image.strings.intern(&target.name);
    image.type_refs.push(TypeRefRow {
        module,
        namespace,
        name,
    });
    TypeRefId((image.type_refs.len() - 1) as u32)
}

/// Retarget a member-ref row, adapting access-shape opcodes when the
/// member kind changes (a field redirected to a property accessor turns
/// loads and stores into calls).
fn retarget_member(image: &mut ModuleImage, id: MemberRefId, target: &MemberIdentity) {
    let parent = find_or_add_type_ref(image, &target.declaring);
    let name = image.strings.intern(&target.name);
    let params = target
        .signature
        .params
        .iter()
        .map(|p| image.strings.intern(p))
        .collect();
    let returns = image.strings.intern(&target.signature.returns);

    let row = &mut image.member_refs[id.0 as usize];
    let old_kind = row.kind;
    row.parent = parent;
    row.kind = target.kind;
    row.name = name;
    row.params = params;
    row.returns = returns;

    if old_kind != target.kind {
        adapt_access_opcodes(image, id, target.kind);
    }
}

fn adapt_access_opcodes(image: &mut ModuleImage, id: MemberRefId, new_kind: MemberKind) {
    for method in &mut image.methods {
        for instr in &mut method.body {
            *instr = match (*instr, new_kind) {
                (Instr::LoadField(m), MemberKind::Method) if m == id => Instr::Call(m),
                (Instr::StoreField(m), MemberKind::Method) if m == id => Instr::Call(m),
                (Instr::Call(m), MemberKind::Field) if m == id => Instr::LoadField(m),
                (other, _) => other,
            };
        }
    }
}

/// Drop removed rows, remapping every index that pointed past them.
///
/// A removed row still referenced by an instruction or a surviving member
/// ref is a rule-set defect, reported as such.
fn compact(
    image: &mut ModuleImage,
    removed_types: &HashSet<u32>,
    removed_members: &HashSet<u32>,
) -> Result<(), String> {
    // Check nothing still uses the rows being removed.
    for (m_idx, row) in image.member_refs.iter().enumerate() {
        if !removed_members.contains(&(m_idx as u32)) && removed_types.contains(&row.parent.0) {
            return Err(format!(
                "removed type ref #{} is still the parent of member ref #{m_idx}",
                row.parent.0
            ));
        }
    }
    for method in &image.methods {
        for instr in &method.body {
            if let Some(m) = instr.member_operand() {
                if removed_members.contains(&m.0) {
                    return Err(format!(
                        "removed member ref #{} is still referenced by an instruction",
                        m.0
                    ));
                }
            }
            if let Some(t) = instr.type_operand() {
                if removed_types.contains(&t.0) {
                    return Err(format!(
                        "removed type ref #{} is still referenced by an instruction",
                        t.0
                    ));
                }
            }
        }
    }

    let type_remap = build_remap(image.type_refs.len(), removed_types);
    let member_remap = build_remap(image.member_refs.len(), removed_members);

    let mut idx = 0u32;
    image.type_refs.retain(|_| {
        let keep = !removed_types.contains(&idx);
        idx += 1;
        keep
    });
    idx = 0;
    image.member_refs.retain(|_| {
        let keep = !removed_members.contains(&idx);
        idx += 1;
        keep
    });

    for row in &mut image.member_refs {
        row.parent = TypeRefId(type_remap[row.parent.0 as usize]);
    }
    for method in &mut image.methods {
        for instr in &mut method.body {
            *instr = match *instr {
                Instr::LoadField(m) => Instr::LoadField(MemberRefId(member_remap[m.0 as usize])),
                Instr::StoreField(m) => Instr::StoreField(MemberRefId(member_remap[m.0 as usize])),
                Instr::Call(m) => Instr::Call(MemberRefId(member_remap[m.0 as usize])),
                Instr::NewObj(t) => Instr::NewObj(TypeRefId(type_remap[t.0 as usize])),
                other => other,
            };
        }
    }

    Ok(())
}

fn build_remap(len: usize, removed: &HashSet<u32>) -> Vec<u32> {
    let mut remap = vec![0u32; len];
    let mut next = 0u32;
    for (idx, slot) in remap.iter_mut().enumerate() {
        if removed.contains(&(idx as u32)) {
            // Dead slot; anything still pointing here was caught above.
            *slot = u32::MAX;
        } else {
            *slot = next;
            next += 1;
        }
    }
    remap
}
