//! Risky member-access analysis
//!
//! Walks a compilation unit's statements, tracks local declarations and
//! type aliases, and flags direct accesses to host fields the rule
//! registry's guidance marks as risky. Resolution is deliberately
//! conservative: a receiver whose type cannot be resolved, a member that
//! merely shares a name with a risky field on an unrelated type, or a
//! collection-shaped field consumed through a general collection interface
//! produce no diagnostic.

use crate::source::{split_statements, Statement};
use modbridge_core::diagnostic::{Diagnostic, DiagnosticCode, Location, Severity};
use modbridge_rules::{FieldGuidance, GuidanceKind, RuleRegistry};
use regex::Regex;
use std::collections::HashMap;

/// Interface names through which collection-shaped wrapper fields are safe
/// to consume.
const SAFE_COLLECTION_INTERFACES: &[&str] = &[
    "IEnumerable",
    "ICollection",
    "IList",
    "ISet",
    "IDictionary",
    "IReadOnlyCollection",
    "IReadOnlyList",
    "IReadOnlySet",
];

/// Words that can never be a declared variable's type
const KEYWORDS: &[&str] = &[
    "using", "return", "new", "if", "else", "while", "for", "foreach", "switch", "case", "class",
    "interface", "struct", "enum", "namespace", "public", "private", "protected", "internal",
    "static", "readonly", "var", "void", "out", "ref", "in", "base", "this", "throw", "yield",
];

/// The build-time source analyzer
pub struct SourceAnalyzer<'a> {
    registry: &'a RuleRegistry,
    declaration: Regex,
    alias: Regex,
    assignment: Regex,
    cast_receiver: Regex,
    plain_receiver: Regex,
}

impl<'a> SourceAnalyzer<'a> {
    /// Create an analyzer sharing the rewriter's rule registry
    pub fn new(registry: &'a RuleRegistry) -> Self {
        Self {
            registry,
            declaration: Regex::new(
                r"^\s*([A-Za-z_][A-Za-z0-9_.]*(?:<[^<>]*>)?(?:\[\])?)\s+([A-Za-z_][A-Za-z0-9_]*)\s*(=.*)?$",
            )
            .expect("hardcoded regex"),
            alias: Regex::new(
                r"^\s*using\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*([A-Za-z_][A-Za-z0-9_.]*)\s*$",
            )
            .expect("hardcoded regex"),
            assignment: Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=[^=]").expect("hardcoded regex"),
            cast_receiver: Regex::new(
                r"^\s*\(\s*([A-Za-z_][A-Za-z0-9_.]*)\s*\)\s*([A-Za-z_][A-Za-z0-9_]*)\s*$",
            )
            .expect("hardcoded regex"),
            plain_receiver: Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*$").expect("hardcoded regex"),
        }
    }

    /// Analyze one compilation unit; `file` names it in diagnostics.
    pub fn analyze(&self, file: &str, source: &str) -> Vec<Diagnostic> {
        let statements = split_statements(source);
        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut locals: HashMap<String, String> = HashMap::new();
        let mut diagnostics = Vec::new();

        for statement in &statements {
            let text = &statement.text;

            if let Some(captures) = self.alias.captures(text) {
                aliases.insert(captures[1].to_string(), captures[2].to_string());
                continue;
            }
            if text.trim_start().starts_with("using ") {
                continue;
            }

            // Work out what the statement assigns into, for the safe
            // collection-interface check, and whether it declares a local.
            let mut declared: Option<(String, String)> = None;
            let mut target_type: Option<String> = None;
            if let Some(captures) = self.declaration.captures(text) {
                let ty = captures[1].to_string();
                if !KEYWORDS.contains(&ty.as_str()) {
                    target_type = Some(ty.clone());
                    declared = Some((captures[2].to_string(), ty));
                }
            } else if let Some(captures) = self.assignment.captures(text) {
                target_type = locals.get(&captures[1]).cloned();
            }

            for access in self.find_accesses(statement) {
                let receiver_type = match &access.cast_type {
                    Some(ty) => Some(ty.clone()),
                    None => locals.get(&access.receiver).cloned(),
                };
                let Some(receiver_type) = receiver_type else {
                    continue;
                };
                let resolved = resolve_type(&receiver_type, &aliases);
                let Some(guidance) = self.find_guidance(&resolved, &access.member) else {
                    continue;
                };

                if is_safe_collection_context(guidance, target_type.as_deref()) {
                    continue;
                }

                diagnostics.push(self.diagnose(file, statement, &access, guidance));
            }

            if let Some((name, ty)) = declared {
                locals.insert(name, base_path(&ty));
            }
        }

        tracing::debug!(file, count = diagnostics.len(), "analyzed compilation unit");
        diagnostics
    }

    fn diagnose(
        &self,
        file: &str,
        statement: &Statement,
        access: &Access,
        guidance: &FieldGuidance,
    ) -> Diagnostic {
        let (code, message) = match &guidance.kind {
            GuidanceKind::NetField { wrapper, .. } => (
                DiagnosticCode::AvoidNetField,
                format!(
                    "'{}' is a {} field; consider using the {} property instead.",
                    access.expr, wrapper, guidance.replacement
                ),
            ),
            GuidanceKind::ObsoleteField => (
                DiagnosticCode::AvoidObsoleteField,
                format!(
                    "'{}' is obsolete and should be replaced with '{}'.",
                    access.expr, guidance.replacement
                ),
            ),
        };

        let mut diagnostic = Diagnostic::new(code, Severity::Warn, message)
            .with_symbol(access.expr.clone())
            .with_suggestion(guidance.replacement.clone());

        if let Some((line, column)) = statement.position_at(access.expr_start) {
            let location = Location::with_position(file, line, column)
                .spanning(column + access.expr.chars().count());
            diagnostic = diagnostic.with_location(location);
        }

        diagnostic
    }

    /// Guidance for a receiver type + member, matching qualified names
    /// exactly and simple names by suffix.
    fn find_guidance(&self, receiver_type: &str, member: &str) -> Option<&FieldGuidance> {
        if receiver_type.contains('.') {
            return self.registry.field_guidance(receiver_type, member);
        }
        let suffix = format!(".{receiver_type}");
        self.registry
            .guidance()
            .iter()
            .find(|g| (g.type_name == receiver_type || g.type_name.ends_with(&suffix)) && g.field == member)
    }

    /// Member accesses (`recv.field`, `(recv).field`, `((Type)recv).field`)
    /// in statement order. Method calls are not field accesses and are
    /// skipped.
    fn find_accesses(&self, statement: &Statement) -> Vec<Access> {
        let chars = statement.chars();
        let mut accesses = Vec::new();

        for dot in 0..chars.len() {
            if chars[dot] != '.' {
                continue;
            }

            // Member name to the right of the dot.
            let mut j = dot + 1;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            let member_start = j;
            if j >= chars.len() || !is_ident_start(chars[j]) {
                continue;
            }
            while j < chars.len() && is_ident_char(chars[j]) {
                j += 1;
            }
            let member: String = chars[member_start..j].iter().collect();

            let mut after = j;
            while after < chars.len() && chars[after] == ' ' {
                after += 1;
            }
            if after < chars.len() && chars[after] == '(' {
                continue;
            }

            // Receiver to the left of the dot.
            let Some(mut l) = dot.checked_sub(1) else {
                continue;
            };
            while chars[l] == ' ' {
                let Some(prev) = l.checked_sub(1) else {
                    break;
                };
                l = prev;
            }

            if chars[l] == ')' {
                let Some(open) = matching_open_paren(&chars, l) else {
                    continue;
                };
                let inner: String = chars[open + 1..l].iter().collect();
                if let Some(captures) = self.cast_receiver.captures(&inner) {
                    accesses.push(Access {
                        expr_start: open,
                        expr: chars[open..j].iter().collect(),
                        receiver: captures[2].to_string(),
                        cast_type: Some(captures[1].to_string()),
                        member,
                    });
                } else if let Some(captures) = self.plain_receiver.captures(&inner) {
                    accesses.push(Access {
                        expr_start: open,
                        expr: chars[open..j].iter().collect(),
                        receiver: captures[1].to_string(),
                        cast_type: None,
                        member,
                    });
                }
            } else if is_ident_char(chars[l]) {
                let mut s = l;
                while s > 0 && is_ident_char(chars[s - 1]) {
                    s -= 1;
                }
                if !is_ident_start(chars[s]) {
                    continue;
                }
                // A receiver preceded by a dot is the middle of a
                // qualified path, not a local.
                if s > 0 && chars[s - 1] == '.' {
                    continue;
                }
                accesses.push(Access {
                    expr_start: s,
                    expr: chars[s..j].iter().collect(),
                    receiver: chars[s..=l].iter().collect(),
                    cast_type: None,
                    member,
                });
            }
        }

        accesses
    }
}

struct Access {
    /// Character index of the expression start within the statement
    expr_start: usize,

    /// The expression as written, e.g. `((Item)item).category`
    expr: String,

    /// Receiver variable name
    receiver: String,

    /// Cast type overriding the receiver's declared type, if any
    cast_type: Option<String>,

    /// Accessed member name
    member: String,
}

/// Collection-shaped wrapper fields consumed through a general collection
/// interface are safe: the interface never exposes the wrapper semantics.
fn is_safe_collection_context(guidance: &FieldGuidance, target_type: Option<&str>) -> bool {
    let GuidanceKind::NetField { collection: true, .. } = &guidance.kind else {
        return false;
    };
    let Some(target) = target_type else {
        return false;
    };
    let simple = simple_name(&base_path(target));
    SAFE_COLLECTION_INTERFACES.contains(&simple.as_str())
}

/// Type path without generic arguments or array suffix
fn base_path(ty: &str) -> String {
    let ty = ty.split('<').next().unwrap_or(ty);
    ty.trim_end_matches("[]").trim().to_string()
}

/// Last segment of a dotted type path
fn simple_name(path: &str) -> String {
    path.rsplit('.').next().unwrap_or(path).to_string()
}

/// Resolve an alias or return the base path unchanged
fn resolve_type(ty: &str, aliases: &HashMap<String, String>) -> String {
    let base = base_path(ty);
    aliases.get(&base).cloned().unwrap_or(base)
}

fn matching_open_paren(chars: &[char], close: usize) -> Option<usize> {
    let mut balance = 1;
    let mut i = close;
    while i > 0 {
        i -= 1;
        match chars[i] {
            ')' => balance += 1,
            '(' => {
                balance -= 1;
                if balance == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbridge_rules::{FieldGuidance, GuidanceKind, RuleRegistry};

    fn registry() -> RuleRegistry {
        RuleRegistry::new(
            vec![],
            vec![
                FieldGuidance {
                    type_name: "StardewValley.Item".into(),
                    field: "category".into(),
                    kind: GuidanceKind::NetField {
                        wrapper: "NetInt".into(),
                        collection: false,
                    },
                    replacement: "Category".into(),
                },
                FieldGuidance {
                    type_name: "StardewValley.Farmer".into(),
                    field: "eventsSeen".into(),
                    kind: GuidanceKind::NetField {
                        wrapper: "NetIntHashSet".into(),
                        collection: true,
                    },
                    replacement: "eventsSeen".into(),
                },
            ],
        )
    }

    #[test]
    fn direct_scalar_field_access_warns() {
        let registry = registry();
        let analyzer = SourceAnalyzer::new(&registry);
        let diagnostics =
            analyzer.analyze("Mod.cs", "Item item = null; int category = item.category;");

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::AvoidNetField);
        assert_eq!(diagnostics[0].symbol.as_deref(), Some("item.category"));
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("Category"));
    }

    #[test]
    fn collection_field_into_interface_is_safe() {
        let registry = registry();
        let analyzer = SourceAnalyzer::new(&registry);
        let diagnostics = analyzer.analyze(
            "Mod.cs",
            "Farmer farmer = null; System.Collections.IEnumerable list = farmer.eventsSeen;",
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn collection_field_into_concrete_type_warns() {
        let registry = registry();
        let analyzer = SourceAnalyzer::new(&registry);
        let diagnostics =
            analyzer.analyze("Mod.cs", "Farmer farmer = null; int n = farmer.eventsSeen;");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn unknown_receiver_type_is_skipped() {
        let registry = registry();
        let analyzer = SourceAnalyzer::new(&registry);
        let diagnostics = analyzer.analyze("Mod.cs", "int category = mystery.category;");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unrelated_member_sharing_a_name_is_skipped() {
        let registry = registry();
        let analyzer = SourceAnalyzer::new(&registry);
        let diagnostics =
            analyzer.analyze("Mod.cs", "Tool tool = null; int category = tool.category;");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn method_calls_are_not_field_accesses() {
        let registry = registry();
        let analyzer = SourceAnalyzer::new(&registry);
        let diagnostics =
            analyzer.analyze("Mod.cs", "Item item = null; int c = item.category();");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn base_path_strips_generics_and_arrays() {
        assert_eq!(base_path("IList<int>"), "IList");
        assert_eq!(base_path("System.Collections.Generic.IList<int>"), "System.Collections.Generic.IList");
        assert_eq!(base_path("int[]"), "int");
    }
}
