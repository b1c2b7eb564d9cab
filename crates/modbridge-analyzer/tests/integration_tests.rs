//! Analyzer tests over a realistic mod compilation unit.
//!
//! The sample program injects the code under test at a fixed position
//! (line 13, column 25) so diagnostics can be checked against exact
//! source locations.

use modbridge_analyzer::SourceAnalyzer;
use modbridge_core::diagnostic::DiagnosticCode;
use modbridge_rules::{FieldGuidance, GuidanceKind, RuleRegistry};
use pretty_assertions::assert_eq;

/// Build the sample program with `code` injected; returns the source and
/// the (line, column) where the injected code starts.
fn sample(code: &str) -> (String, usize, usize) {
    let template = "\
using System;
using StardewValley;
using Netcode;
using SObject = StardewValley.Object;

namespace SampleMod
{
    class ModEntry
    {
        public void Entry()
        {
            Farmer farmer = null;
                        {{code}}
        }
    }
}
";
    let idx = template.find("{{code}}").unwrap();
    let line = template[..idx].matches('\n').count() + 1;
    let col = idx - template[..idx].rfind('\n').unwrap();
    (template.replace("{{code}}", code), line, col)
}

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
                type_name: "StardewValley.Object".into(),
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
            FieldGuidance {
                type_name: "StardewValley.Farmer".into(),
                field: "netList".into(),
                kind: GuidanceKind::NetField {
                    wrapper: "NetList".into(),
                    collection: true,
                },
                replacement: "netList".into(),
            },
            FieldGuidance {
                type_name: "StardewValley.Farmer".into(),
                field: "friendships".into(),
                kind: GuidanceKind::ObsoleteField,
                replacement: "friendshipData".into(),
            },
        ],
    )
}

#[test]
fn sample_program_injects_at_line_13_column_25() {
    let (_, line, col) = sample("");
    assert_eq!((line, col), (13, 25));
}

#[test]
fn empty_code_has_no_diagnostics() {
    let registry = registry();
    let analyzer = SourceAnalyzer::new(&registry);
    let (source, _, _) = sample("");
    assert!(analyzer.analyze("Test0.cs", &source).is_empty());
}

#[test]
fn safe_collection_interface_access_has_no_diagnostics() {
    let registry = registry();
    let analyzer = SourceAnalyzer::new(&registry);

    for code in [
        "System.Collections.IEnumerable list = farmer.eventsSeen;",
        "System.Collections.Generic.IList<int> list = farmer.netList;",
        "System.Collections.Generic.ICollection<int> list = farmer.netList;",
    ] {
        let (source, _, _) = sample(code);
        let diagnostics = analyzer.analyze("Test0.cs", &source);
        assert!(diagnostics.is_empty(), "expected no diagnostics for: {code}");
    }
}

#[test]
fn direct_net_field_access_raises_a_diagnostic() {
    let registry = registry();
    let analyzer = SourceAnalyzer::new(&registry);

    let cases = [
        ("Item item = null; int category = item.category;", "item.category"),
        ("Item item = null; int category = (item).category;", "(item).category"),
        (
            "Item item = null; int category = ((Item)item).category;",
            "((Item)item).category",
        ),
        ("SObject obj = null; int category = obj.category;", "obj.category"),
    ];

    for (code, expression) in cases {
        let (source, line, col) = sample(code);
        let diagnostics = analyzer.analyze("Test0.cs", &source);

        assert_eq!(diagnostics.len(), 1, "one diagnostic expected for: {code}");
        let d = &diagnostics[0];
        assert_eq!(d.code, DiagnosticCode::AvoidNetField);
        assert_eq!(d.code.as_str(), "AvoidNetField");
        assert_eq!(d.symbol.as_deref(), Some(expression));
        assert_eq!(d.suggestion.as_deref(), Some("Category"));
        assert!(d.message.contains("NetInt"), "message names the wrapper: {}", d.message);
        assert!(d.message.contains("Category"));

        let location = d.location.as_ref().unwrap();
        assert_eq!(location.file, "Test0.cs");
        assert_eq!(location.line, Some(line));
        assert_eq!(location.column, Some(col + code.find(expression).unwrap()));
    }
}

#[test]
fn item_category_diagnostic_points_at_exact_position() {
    let registry = registry();
    let analyzer = SourceAnalyzer::new(&registry);

    let code = "Item item = null; int category = item.category;";
    let (source, line, col) = sample(code);
    let diagnostics = analyzer.analyze("Test0.cs", &source);

    assert_eq!(line, 13);
    assert_eq!(col, 25);
    let location = diagnostics[0].location.as_ref().unwrap();
    assert_eq!(location.line, Some(13));
    assert_eq!(location.column, Some(25 + code.find("item.category").unwrap()));
    assert_eq!(
        location.end_column,
        Some(location.column.unwrap() + "item.category".len())
    );
}

#[test]
fn obsolete_field_access_raises_a_diagnostic() {
    let registry = registry();
    let analyzer = SourceAnalyzer::new(&registry);

    let (source, _, _) = sample("var f = farmer.friendships;");
    let diagnostics = analyzer.analyze("Test0.cs", &source);

    assert_eq!(diagnostics.len(), 1);
    let d = &diagnostics[0];
    assert_eq!(d.code, DiagnosticCode::AvoidObsoleteField);
    assert!(d.message.contains("obsolete"));
    assert_eq!(d.suggestion.as_deref(), Some("friendshipData"));
}

#[test]
fn accesses_inside_strings_and_comments_are_ignored() {
    let registry = registry();
    let analyzer = SourceAnalyzer::new(&registry);

    let (source, _, _) = sample(
        "Item item = null; string s = \"item.category\"; // item.category",
    );
    assert!(analyzer.analyze("Test0.cs", &source).is_empty());
}

#[test]
fn unrelated_type_with_same_field_name_is_ignored() {
    let registry = registry();
    let analyzer = SourceAnalyzer::new(&registry);

    let (source, _, _) = sample("Tool tool = null; int category = tool.category;");
    assert!(analyzer.analyze("Test0.cs", &source).is_empty());
}
