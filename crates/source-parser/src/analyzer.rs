use crate::coverage::check_coverage;
use crate::error::{ParserError, Result};
use crate::imports::{import_decls, is_import_kind, node_text, ImportDecl};
use crate::references::{analyze, definition_node, BodyAnalysis};
use crate::types::{LineSpan, SourceUnit, StatementRole, StructuralIndex, UnitKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

static ENTRY_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\(?\s*(?:__name__\s*==\s*['"]__main__['"]|['"]__main__['"]\s*==\s*__name__)\s*\)?$"#)
        .expect("entry guard pattern is valid")
});

/// Tree-sitter front end that turns a Python document into a `StructuralIndex`
pub struct SourceParser {
    parser: Parser,
}

impl SourceParser {
    pub fn new() -> Result<Self> {
        let ts_language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ParserError::tree_sitter(format!("Failed to set language: {e}")))?;

        Ok(Self { parser })
    }

    /// Read and parse a document from disk
    pub fn parse_file(&mut self, path: &Path) -> Result<StructuralIndex> {
        let content = std::fs::read_to_string(path)?;
        let mut index = self.parse(&content)?;
        index.path = Some(path.display().to_string());
        Ok(index)
    }

    /// Parse a document into top-level units with exact boundaries
    pub fn parse(&mut self, document: &str) -> Result<StructuralIndex> {
        let text = normalize_source(document);
        let tree = self.parse_tree(&text)?;
        let source = text.as_bytes();
        let lines: Vec<&str> = text.lines().collect();

        let mut units = Vec::new();
        for group in top_level_groups(tree.root_node()) {
            let span = group_span(&group);
            let raw_body = lines
                .get(span.start - 1..span.end.min(lines.len()))
                .map(|slice| slice.join("\n"))
                .unwrap_or_default();
            if let Some(unit) = classify_group(&group, source, span, raw_body) {
                units.push(unit);
            }
        }

        let known: HashSet<String> = units.iter().filter_map(|u| u.name.clone()).collect();
        for unit in &mut units {
            if unit.kind == UnitKind::Import {
                continue;
            }
            let analysis = self
                .analyze_body(&unit.raw_body)
                .map_err(|err| relocate(err, unit.span.start))?;
            unit.used_names = analysis
                .references
                .iter()
                .map(|r| r.name.as_str())
                .filter(|name| known.contains(*name) && !unit.is_named(name))
                .map(str::to_string)
                .collect();
        }

        let spans: Vec<LineSpan> = units.iter().map(|u| u.span).collect();
        check_coverage(&lines, &spans)?;

        log::debug!(
            "Parsed {} top-level units from {} lines",
            units.len(),
            lines.len()
        );

        Ok(StructuralIndex {
            path: None,
            line_count: lines.len(),
            units,
        })
    }

    /// Parse one unit body on its own and collect its free references
    pub fn analyze_body(&mut self, body: &str) -> Result<BodyAnalysis> {
        let tree = self.parse_tree(body)?;
        Ok(analyze(tree.root_node(), body.as_bytes()))
    }

    /// Lines (1-indexed) covered by string literals that span several lines
    pub fn multiline_string_lines(&mut self, document: &str) -> Result<BTreeSet<usize>> {
        let tree = self.parse_tree(document)?;
        let mut lines = BTreeSet::new();
        collect_string_lines(tree.root_node(), &mut lines);
        Ok(lines)
    }

    fn parse_tree(&mut self, text: &str) -> Result<Tree> {
        let tree = self
            .parser
            .parse(text, None)
            .ok_or_else(|| ParserError::tree_sitter("Parser produced no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, column, message) = first_error(root, text.as_bytes())
                .unwrap_or_else(|| (1, 1, "syntax error".to_string()));
            return Err(ParserError::structural(line, column, message));
        }

        Ok(tree)
    }
}

/// Drop a byte-order mark and convert CRLF line endings
#[must_use]
pub fn normalize_source(document: &str) -> String {
    document
        .strip_prefix('\u{feff}')
        .unwrap_or(document)
        .replace("\r\n", "\n")
}

fn node_span(node: Node) -> LineSpan {
    let start = node.start_position();
    let end = node.end_position();
    // A node ending at column 0 stops on the previous line
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    LineSpan::new(start.row + 1, end_line)
}

/// Top-level statements, with statements sharing a line grouped together
fn top_level_groups(root: Node) -> Vec<Vec<Node>> {
    let mut groups: Vec<Vec<Node>> = Vec::new();
    let mut last_end = 0;
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "comment" {
            continue;
        }
        let span = node_span(child);
        match groups.last_mut() {
            Some(group) if span.start <= last_end => {
                group.push(child);
                last_end = last_end.max(span.end);
            }
            _ => {
                groups.push(vec![child]);
                last_end = span.end;
            }
        }
    }
    groups
}

fn group_span(group: &[Node]) -> LineSpan {
    let start = group.iter().map(|n| node_span(*n).start).min().unwrap_or(1);
    let end = group.iter().map(|n| node_span(*n).end).max().unwrap_or(start);
    LineSpan::new(start, end)
}

fn classify_group(
    group: &[Node],
    source: &[u8],
    span: LineSpan,
    raw_body: String,
) -> Option<SourceUnit> {
    if let [node] = group {
        return classify_node(*node, source, span, raw_body);
    }

    if group.iter().all(|n| is_import_kind(n.kind())) {
        let mut unit = SourceUnit::new(UnitKind::Import, span, raw_body);
        unit.imports = group
            .iter()
            .flat_map(|n| import_decls(*n, source, 0))
            .collect();
        return Some(unit);
    }

    let imports: Vec<ImportDecl> = group
        .iter()
        .flat_map(|n| nested_imports(*n, source))
        .collect();
    let role = if imports.is_empty() {
        StatementRole::Plain
    } else {
        StatementRole::ConditionalImport
    };
    let mut unit = SourceUnit::new(UnitKind::Statement(role), span, raw_body);
    unit.imports = imports;
    Some(unit)
}

fn classify_node(node: Node, source: &[u8], span: LineSpan, raw_body: String) -> Option<SourceUnit> {
    if is_import_kind(node.kind()) {
        let mut unit = SourceUnit::new(UnitKind::Import, span, raw_body);
        unit.imports = import_decls(node, source, 0);
        return Some(unit);
    }

    if let Some(definition) = definition_node(node) {
        let kind = if definition.kind() == "class_definition" {
            UnitKind::TypeDefinition
        } else {
            UnitKind::FreeFunction
        };
        let mut unit = SourceUnit::new(kind, span, raw_body);
        unit.name = definition
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string());
        if kind == UnitKind::TypeDefinition {
            unit.base_refs = base_refs(definition, source);
        }
        return Some(unit);
    }

    if let Some((name, initializer)) = binding_shape(node, source) {
        if starts_indented(&raw_body) {
            log::warn!(
                "Rejected binding '{name}' at line {}: first line is indented",
                span.start
            );
            return None;
        }
        let mut unit = SourceUnit::new(UnitKind::Binding, span, raw_body);
        unit.name = Some(name);
        unit.initializer = initializer;
        return Some(unit);
    }

    let imports = nested_imports(node, source);
    let role = if is_entry_guard(node, source) {
        StatementRole::EntryGuard
    } else if imports.is_empty() {
        StatementRole::Plain
    } else {
        StatementRole::ConditionalImport
    };
    let mut unit = SourceUnit::new(UnitKind::Statement(role), span, raw_body);
    unit.imports = imports;
    Some(unit)
}

fn base_refs(class: Node, source: &[u8]) -> Vec<String> {
    let Some(bases) = class.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut refs: Vec<String> = Vec::new();
    let mut cursor = bases.walk();
    for base in bases.named_children(&mut cursor) {
        if let Some(head) = head_name(base, source) {
            if !refs.contains(&head) {
                refs.push(head);
            }
        }
    }
    refs
}

/// Leftmost identifier of an expression like `a.b`, `a[T]` or `a(x)`
fn head_name(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "attribute" => head_name(node.child_by_field_name("object")?, source),
        "subscript" => head_name(node.child_by_field_name("value")?, source),
        "call" => head_name(node.child_by_field_name("function")?, source),
        "keyword_argument" => head_name(node.child_by_field_name("value")?, source),
        _ => None,
    }
}

/// `name = value` with a single identifier target; returns the name and a direct callee
fn binding_shape(node: Node, source: &[u8]) -> Option<(String, Option<String>)> {
    if node.kind() != "expression_statement" {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    let [assignment] = children.as_slice() else {
        return None;
    };
    if assignment.kind() != "assignment" {
        return None;
    }

    let left = assignment.child_by_field_name("left")?;
    if left.kind() != "identifier" {
        return None;
    }
    let right = assignment.child_by_field_name("right");
    if right.is_some_and(|r| r.kind() == "assignment") {
        return None;
    }

    let initializer = right
        .filter(|r| r.kind() == "call")
        .and_then(|call| call.child_by_field_name("function"))
        .filter(|callee| callee.kind() == "identifier")
        .map(|callee| node_text(callee, source).to_string());

    Some((node_text(left, source).to_string(), initializer))
}

fn is_entry_guard(node: Node, source: &[u8]) -> bool {
    node.kind() == "if_statement"
        && node
            .child_by_field_name("condition")
            .is_some_and(|condition| ENTRY_GUARD.is_match(node_text(condition, source).trim()))
}

/// Imports nested in a statement block, not counting those inside definitions
fn nested_imports(node: Node, source: &[u8]) -> Vec<ImportDecl> {
    let mut found = Vec::new();
    collect_nested_imports(node, source, &mut found);
    found
}

fn collect_nested_imports(node: Node, source: &[u8], found: &mut Vec<ImportDecl>) {
    if is_import_kind(node.kind()) {
        found.extend(import_decls(node, source, 0));
        return;
    }
    if matches!(
        node.kind(),
        "function_definition" | "class_definition" | "lambda"
    ) {
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_nested_imports(child, source, found);
    }
}

fn starts_indented(raw_body: &str) -> bool {
    raw_body
        .lines()
        .find(|line| crate::coverage::is_significant(line))
        .is_some_and(|line| line.starts_with([' ', '\t']))
}

fn collect_string_lines(node: Node, lines: &mut BTreeSet<usize>) {
    if node.kind() == "string" {
        let (start, end) = (node.start_position().row, node.end_position().row);
        if end > start {
            lines.extend(start + 1..=end + 1);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_string_lines(child, lines);
    }
}

fn first_error(node: Node, source: &[u8]) -> Option<(usize, usize, String)> {
    if node.is_missing() {
        let pos = node.start_position();
        return Some((pos.row + 1, pos.column + 1, format!("missing `{}`", node.kind())));
    }
    if node.is_error() {
        let pos = node.start_position();
        let snippet: String = node_text(node, source)
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(40)
            .collect();
        return Some((pos.row + 1, pos.column + 1, format!("unexpected `{snippet}`")));
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| first_error(child, source))
}

/// Shift a structural error found in an isolated body back to document lines
fn relocate(err: ParserError, first_line: usize) -> ParserError {
    match err {
        ParserError::StructuralError {
            line,
            column,
            message,
        } => ParserError::structural(line + first_line - 1, column, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> StructuralIndex {
        SourceParser::new().unwrap().parse(code).unwrap()
    }

    fn names(index: &StructuralIndex, kind: UnitKind) -> Vec<String> {
        index
            .units
            .iter()
            .filter(|u| u.kind == kind)
            .map(|u| u.name().to_string())
            .collect()
    }

    #[test]
    fn test_extracts_top_level_only() {
        let code = r#"import os

VERSION = "1.0"

class Base:
    class Inner:
        pass

    def method(self):
        def helper():
            return 1
        return helper()

def main():
    return Base()
"#;
        let index = parse(code);

        assert_eq!(names(&index, UnitKind::TypeDefinition), vec!["Base"]);
        assert_eq!(names(&index, UnitKind::FreeFunction), vec!["main"]);
        assert_eq!(names(&index, UnitKind::Binding), vec!["VERSION"]);

        let base = index.find_definition("Base").unwrap();
        assert_eq!(base.span, LineSpan::new(5, 12));
        let main = index.find_definition("main").unwrap();
        assert_eq!(main.span, LineSpan::new(14, 15));
        assert_eq!(main.raw_body, "def main():\n    return Base()");
        assert!(main.used_names.contains("Base"));
    }

    #[test]
    fn test_decorated_definition_starts_at_decorator() {
        let code = "def deco(fn):\n    return fn\n\n@deco\ndef wrapped():\n    pass\n";
        let index = parse(code);
        let wrapped = index.find_definition("wrapped").unwrap();
        assert_eq!(wrapped.span, LineSpan::new(4, 6));
        assert!(wrapped.used_names.contains("deco"));
    }

    #[test]
    fn test_base_refs_and_metaclass() {
        let code = "class Meta(type):\n    pass\n\nclass Base:\n    pass\n\nclass Derived(Base, abc.ABC, metaclass=Meta):\n    pass\n";
        let index = parse(code);
        let derived = index.find_definition("Derived").unwrap();
        assert_eq!(derived.base_refs, vec!["Base", "abc", "Meta"]);
        assert!(derived.used_names.contains("Base"));
        assert!(derived.used_names.contains("Meta"));
    }

    #[test]
    fn test_binding_shapes() {
        let code = "app = App()\nx = y = 1\na, b = 1, 2\nlimit: int = 5\ncounter += 1\n\nclass App:\n    pass\n";
        let index = parse(code);

        assert_eq!(names(&index, UnitKind::Binding), vec!["app", "limit"]);
        let app = index.bindings().next().unwrap();
        assert_eq!(app.initializer.as_deref(), Some("App"));
        assert!(app.used_names.contains("App"));
        assert_eq!(index.statements().count(), 3);
    }

    #[test]
    fn test_statement_roles() {
        let code = r#"try:
    import json
except ImportError:
    json = None

print("loading")

if __name__ == '__main__':
    print("run")
"#;
        let index = parse(code);
        let roles: Vec<UnitKind> = index.units.iter().map(|u| u.kind).collect();
        assert_eq!(
            roles,
            vec![
                UnitKind::Statement(StatementRole::ConditionalImport),
                UnitKind::Statement(StatementRole::Plain),
                UnitKind::Statement(StatementRole::EntryGuard),
            ]
        );
        assert_eq!(index.units[0].imports[0].module, "json");
    }

    #[test]
    fn test_import_forms() {
        let code = "import os, sys as system\nfrom typing import List, Dict as D\nfrom . import sibling\nfrom tkinter import *\nfrom __future__ import annotations\n";
        let index = parse(code);
        let rendered: Vec<String> = index.imports().map(ImportDecl::render).collect();
        assert_eq!(
            rendered,
            vec![
                "import os",
                "import sys as system",
                "from typing import List",
                "from typing import Dict as D",
                "from . import sibling",
                "from tkinter import *",
                "from __future__ import annotations",
            ]
        );
        let lines: Vec<usize> = index.imports().map(|d| d.line).collect();
        assert_eq!(lines, vec![1, 1, 2, 2, 3, 4, 5]);
    }

    #[test]
    fn test_same_line_statements_group() {
        let code = "import os; import sys\nx = 1; y = 2\n";
        let index = parse(code);
        assert_eq!(index.units.len(), 2);
        assert_eq!(index.units[0].kind, UnitKind::Import);
        assert_eq!(index.units[0].imports.len(), 2);
        assert_eq!(
            index.units[1].kind,
            UnitKind::Statement(StatementRole::Plain)
        );
    }

    #[test]
    fn test_structural_error_position() {
        let mut parser = SourceParser::new().unwrap();
        let err = parser.parse("x = 1\ndef broken(:\n    pass\n").unwrap_err();
        match err {
            ParserError::StructuralError { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_crlf_and_bom_are_normalized() {
        let index = parse("\u{feff}X = 1\r\ndef f():\r\n    return X\r\n");
        assert_eq!(index.line_count, 3);
        let f = index.find_definition("f").unwrap();
        assert_eq!(f.raw_body, "def f():\n    return X");
        assert!(f.used_names.contains("X"));
    }

    #[test]
    fn test_multiline_string_lines() {
        let code = "x = 1\ndoc = \"\"\"first\n\n    second\\t\n\"\"\"\ny = 'one line'\n";
        let lines = SourceParser::new().unwrap().multiline_string_lines(code).unwrap();
        assert_eq!(lines.into_iter().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_parse_file_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.py");
        std::fs::write(&path, "def main():\n    pass\n").unwrap();

        let index = SourceParser::new().unwrap().parse_file(&path).unwrap();
        assert_eq!(index.path.as_deref(), Some(path.display().to_string().as_str()));
        assert_eq!(index.free_functions().count(), 1);
    }
}
