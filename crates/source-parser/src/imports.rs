use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

/// Rendered from-imports longer than this are wrapped in parentheses
const WRAP_WIDTH: usize = 88;

/// Form of an import declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImportKind {
    /// `import module [as alias]`
    Plain,

    /// `from module import name [as alias]`
    From,

    /// `from __future__ import name`
    Future,
}

/// One imported name with its declaration line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportDecl {
    pub kind: ImportKind,
    pub module: String,
    pub name: Option<String>,
    pub alias: Option<String>,

    /// Declaration line (1-indexed)
    pub line: usize,
}

impl ImportDecl {
    pub fn plain(module: impl Into<String>, alias: Option<String>, line: usize) -> Self {
        Self {
            kind: ImportKind::Plain,
            module: module.into(),
            name: None,
            alias,
            line,
        }
    }

    pub fn from_module(
        module: impl Into<String>,
        name: impl Into<String>,
        alias: Option<String>,
        line: usize,
    ) -> Self {
        Self {
            kind: ImportKind::From,
            module: module.into(),
            name: Some(name.into()),
            alias,
            line,
        }
    }

    pub fn future(name: impl Into<String>, line: usize) -> Self {
        Self {
            kind: ImportKind::Future,
            module: "__future__".to_string(),
            name: Some(name.into()),
            alias: None,
            line,
        }
    }

    #[must_use]
    pub fn is_aliased(&self) -> bool {
        self.alias.is_some()
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.kind == ImportKind::From && self.name.as_deref() == Some("*")
    }

    /// Name this declaration binds in the importing namespace
    #[must_use]
    pub fn bound_name(&self) -> Option<&str> {
        if let Some(alias) = self.alias.as_deref() {
            return Some(alias);
        }
        match self.kind {
            ImportKind::Plain => self.module.split('.').next(),
            _ if self.is_wildcard() => None,
            _ => self.name.as_deref(),
        }
    }

    /// First dotted segment of the module, ignoring relative dots
    #[must_use]
    pub fn root_module(&self) -> &str {
        self.module
            .trim_start_matches('.')
            .split('.')
            .next()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.module.starts_with('.')
    }

    /// Canonical single-name statement; also the deduplication key
    #[must_use]
    pub fn render(&self) -> String {
        match self.kind {
            ImportKind::Plain => match &self.alias {
                Some(alias) => format!("import {} as {alias}", self.module),
                None => format!("import {}", self.module),
            },
            ImportKind::From | ImportKind::Future => {
                format!("from {} import {}", self.module, self.name_clause())
            }
        }
    }

    fn name_clause(&self) -> String {
        let name = self.name.as_deref().unwrap_or_default();
        match &self.alias {
            Some(alias) => format!("{name} as {alias}"),
            None => name.to_string(),
        }
    }
}

/// Render declarations as statements.
///
/// Future imports come first, then plain imports, then from-imports merged per
/// module. Plain and from groups are sorted by module; names keep first-seen order.
#[must_use]
pub fn render_imports(decls: &[ImportDecl]) -> Vec<String> {
    let mut futures: Vec<String> = Vec::new();
    let mut plains: BTreeSet<String> = BTreeSet::new();
    let mut wildcards: BTreeSet<&str> = BTreeSet::new();
    let mut froms: BTreeMap<&str, Vec<String>> = BTreeMap::new();

    for decl in decls {
        match decl.kind {
            ImportKind::Future => {
                let clause = decl.name_clause();
                if !futures.contains(&clause) {
                    futures.push(clause);
                }
            }
            ImportKind::Plain => {
                plains.insert(decl.render());
            }
            ImportKind::From if decl.is_wildcard() => {
                wildcards.insert(decl.module.as_str());
            }
            ImportKind::From => {
                let names = froms.entry(decl.module.as_str()).or_default();
                let clause = decl.name_clause();
                if !names.contains(&clause) {
                    names.push(clause);
                }
            }
        }
    }

    let mut lines = Vec::new();
    if !futures.is_empty() {
        lines.push(format!("from __future__ import {}", futures.join(", ")));
    }
    lines.extend(plains);

    let modules: BTreeSet<&str> = wildcards.iter().chain(froms.keys()).copied().collect();
    for module in modules {
        if wildcards.contains(module) {
            lines.push(format!("from {module} import *"));
        }
        if let Some(names) = froms.get(module) {
            lines.push(render_from(module, names));
        }
    }
    lines
}

fn render_from(module: &str, names: &[String]) -> String {
    let single = format!("from {module} import {}", names.join(", "));
    if single.len() <= WRAP_WIDTH || names.len() == 1 {
        return single;
    }
    let mut wrapped = format!("from {module} import (\n");
    for name in names {
        wrapped.push_str("    ");
        wrapped.push_str(name);
        wrapped.push_str(",\n");
    }
    wrapped.push(')');
    wrapped
}

pub(crate) fn is_import_kind(kind: &str) -> bool {
    matches!(
        kind,
        "import_statement" | "import_from_statement" | "future_import_statement"
    )
}

pub(crate) fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

/// Extract one declaration per imported name from an import statement node
pub(crate) fn import_decls(node: Node, source: &[u8], line_offset: usize) -> Vec<ImportDecl> {
    let line = node.start_position().row + 1 + line_offset;
    let mut decls = Vec::new();
    let mut cursor = node.walk();

    match node.kind() {
        "import_statement" => {
            for child in node.named_children(&mut cursor) {
                if let Some((name, alias)) = name_and_alias(child, source) {
                    decls.push(ImportDecl::plain(name, alias, line));
                }
            }
        }
        "future_import_statement" => {
            for child in node.named_children(&mut cursor) {
                if let Some((name, _)) = name_and_alias(child, source) {
                    decls.push(ImportDecl::future(name, line));
                }
            }
        }
        "import_from_statement" => {
            let module_node = node.child_by_field_name("module_name");
            let module = module_node
                .map(|n| compact(node_text(n, source)))
                .unwrap_or_default();
            let module_id = module_node.map(|n| n.id());

            for child in node.named_children(&mut cursor) {
                if Some(child.id()) == module_id || child.kind() == "comment" {
                    continue;
                }
                if child.kind() == "wildcard_import" {
                    decls.push(ImportDecl::from_module(module.clone(), "*", None, line));
                } else if let Some((name, alias)) = name_and_alias(child, source) {
                    decls.push(ImportDecl::from_module(module.clone(), name, alias, line));
                }
            }
        }
        _ => {}
    }

    decls
}

fn name_and_alias(node: Node, source: &[u8]) -> Option<(String, Option<String>)> {
    match node.kind() {
        "dotted_name" => Some((compact(node_text(node, source)), None)),
        "aliased_import" => {
            let name = node.child_by_field_name("name")?;
            let alias = node
                .child_by_field_name("alias")
                .map(|alias| node_text(alias, source).to_string());
            Some((compact(node_text(name, source)), alias))
        }
        _ => None,
    }
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bound_names() {
        assert_eq!(ImportDecl::plain("os.path", None, 1).bound_name(), Some("os"));
        assert_eq!(
            ImportDecl::plain("numpy", Some("np".into()), 1).bound_name(),
            Some("np")
        );
        assert_eq!(
            ImportDecl::from_module("typing", "List", None, 1).bound_name(),
            Some("List")
        );
        assert_eq!(
            ImportDecl::from_module("tkinter", "*", None, 1).bound_name(),
            None
        );
    }

    #[test]
    fn test_render_groups_and_sorts() {
        let decls = vec![
            ImportDecl::plain("sys", None, 1),
            ImportDecl::from_module("typing", "List", None, 2),
            ImportDecl::future("annotations", 3),
            ImportDecl::plain("os", None, 4),
            ImportDecl::from_module("collections", "deque", None, 5),
            ImportDecl::from_module("typing", "Dict", None, 6),
            ImportDecl::from_module("typing", "List", None, 7),
            ImportDecl::plain("numpy", Some("np".into()), 8),
        ];

        assert_eq!(
            render_imports(&decls),
            vec![
                "from __future__ import annotations",
                "import numpy as np",
                "import os",
                "import sys",
                "from collections import deque",
                "from typing import List, Dict",
            ]
        );
    }

    #[test]
    fn test_render_wildcard_and_relative() {
        let decls = vec![
            ImportDecl::from_module("tkinter", "ttk", None, 1),
            ImportDecl::from_module("tkinter", "*", None, 1),
            ImportDecl::from_module("..pkg", "helper", Some("h".into()), 2),
        ];

        assert_eq!(
            render_imports(&decls),
            vec![
                "from ..pkg import helper as h",
                "from tkinter import *",
                "from tkinter import ttk",
            ]
        );
        assert!(decls[2].is_relative());
        assert_eq!(decls[2].root_module(), "pkg");
    }

    #[test]
    fn test_long_from_import_wraps() {
        let decls: Vec<ImportDecl> = (0..12)
            .map(|i| ImportDecl::from_module("package.module", format!("name_{i}"), None, 1))
            .collect();
        let rendered = render_imports(&decls);
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].starts_with("from package.module import (\n    name_0,\n"));
        assert!(rendered[0].ends_with("    name_11,\n)"));
    }
}
