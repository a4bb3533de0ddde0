use crate::imports::{import_decls, is_import_kind, node_text, ImportDecl};
use std::collections::{BTreeSet, HashSet};
use tree_sitter::Node;

const COMPREHENSIONS: [&str; 4] = [
    "list_comprehension",
    "set_comprehension",
    "dictionary_comprehension",
    "generator_expression",
];

const TARGET_CONTAINERS: [&str; 10] = [
    "pattern_list",
    "tuple_pattern",
    "list_pattern",
    "tuple",
    "list",
    "parenthesized_expression",
    "list_splat_pattern",
    "dictionary_splat_pattern",
    "list_splat",
    "as_pattern_target",
];

/// A free-name occurrence inside an analyzed body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub start_byte: usize,
    pub end_byte: usize,

    /// Assignment to a name the enclosing function declares `global`
    pub write: bool,
}

/// Import statement sitting directly in a definition body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImport {
    /// Start of the first line holding the statement
    pub start_byte: usize,

    /// End of the last line, newline included
    pub end_byte: usize,

    pub decls: Vec<ImportDecl>,
}

/// Scope-aware analysis of one unit body parsed in isolation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyAnalysis {
    /// Free references, ordered by position
    pub references: Vec<Reference>,
    pub local_imports: Vec<LocalImport>,
}

impl BodyAnalysis {
    #[must_use]
    pub fn free_names(&self) -> BTreeSet<String> {
        self.references.iter().map(|r| r.name.clone()).collect()
    }

    /// Names assigned through a `global` declaration
    #[must_use]
    pub fn global_writes(&self) -> BTreeSet<&str> {
        self.references
            .iter()
            .filter(|r| r.write)
            .map(|r| r.name.as_str())
            .collect()
    }
}

pub(crate) fn analyze(root: Node, source: &[u8]) -> BodyAnalysis {
    let mut walker = ReferenceWalker {
        source,
        scopes: Vec::new(),
        references: Vec::new(),
    };
    walker.visit(root);
    walker.references.sort_by_key(|r| r.start_byte);
    walker.references.dedup_by_key(|r| r.start_byte);

    BodyAnalysis {
        references: walker.references,
        local_imports: local_imports(root, source),
    }
}

/// Unwrap a decorated definition, or return a bare one
pub(crate) fn definition_node(node: Node) -> Option<Node> {
    match node.kind() {
        "decorated_definition" => node.child_by_field_name("definition"),
        "function_definition" | "class_definition" => Some(node),
        _ => None,
    }
}

#[derive(Default)]
struct Scope {
    bound: HashSet<String>,
    globals: HashSet<String>,
    nonlocals: HashSet<String>,
}

struct ReferenceWalker<'s> {
    source: &'s [u8],
    scopes: Vec<Scope>,
    references: Vec<Reference>,
}

impl<'s> ReferenceWalker<'s> {
    fn text(&self, node: Node) -> &'s str {
        node_text(node, self.source)
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "identifier" => self.read(node, false),
            "attribute" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object);
                }
            }
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "dotted_name" => {
                let mut cursor = node.walk();
                if let Some(head) = node.named_children(&mut cursor).next() {
                    self.visit(head);
                };
            }
            "function_definition" => self.visit_function(node),
            "lambda" => self.visit_lambda(node),
            "class_definition" => {
                // Class bodies are not a scope for the methods inside them
                if let Some(bases) = node.child_by_field_name("superclasses") {
                    self.visit(bases);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body);
                }
            }
            "assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.visit_target(left);
                }
                if let Some(annotation) = node.child_by_field_name("type") {
                    self.visit(annotation);
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.visit(right);
                }
            }
            "augmented_assignment" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.visit_augmented_target(left);
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.visit(right);
                }
            }
            "for_statement" | "for_in_clause" => {
                let left = node.child_by_field_name("left");
                if let Some(left) = left {
                    self.visit_target(left);
                }
                let left_id = left.map(|n| n.id());
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if Some(child.id()) != left_id {
                        self.visit(child);
                    }
                }
            }
            "as_pattern" => {
                let alias_id = node.child_by_field_name("alias").map(|n| n.id());
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if Some(child.id()) == alias_id {
                        self.visit_target(child);
                    } else {
                        self.visit(child);
                    }
                }
            }
            "except_clause" => self.visit_except(node),
            "named_expression" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
                if let Some(name) = node.child_by_field_name("name") {
                    self.visit_target(name);
                }
            }
            "global_statement" | "nonlocal_statement" => {}
            kind if is_import_kind(kind) => {}
            kind if COMPREHENSIONS.contains(&kind) => self.visit_comprehension(node),
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit_function(&mut self, node: Node) {
        let params = node.child_by_field_name("parameters");
        if let Some(params) = params {
            self.visit_parameter_defaults(params);
        }
        if let Some(returns) = node.child_by_field_name("return_type") {
            self.visit(returns);
        }

        let mut scope = Scope::default();
        if let Some(params) = params {
            collect_parameter_names(params, self.source, &mut scope.bound);
        }
        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            collect_bindings(body, self.source, &mut scope);
        }

        self.scopes.push(scope);
        if let Some(body) = body {
            self.visit(body);
        }
        self.scopes.pop();
    }

    fn visit_lambda(&mut self, node: Node) {
        let mut scope = Scope::default();
        if let Some(params) = node.child_by_field_name("parameters") {
            self.visit_parameter_defaults(params);
            collect_parameter_names(params, self.source, &mut scope.bound);
        }
        self.scopes.push(scope);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.scopes.pop();
    }

    fn visit_comprehension(&mut self, node: Node) {
        let mut scope = Scope::default();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "for_in_clause" {
                if let Some(left) = child.child_by_field_name("left") {
                    collect_target_names(left, self.source, &mut scope.bound);
                }
            }
        }
        self.scopes.push(scope);
        self.visit_children(node);
        self.scopes.pop();
    }

    fn visit_except(&mut self, node: Node) {
        let mut after_as = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if !child.is_named() {
                after_as = child.kind() == "as";
                continue;
            }
            if after_as {
                self.visit_target(child);
            } else {
                self.visit(child);
            }
            after_as = false;
        }
    }

    fn visit_parameter_defaults(&mut self, params: Node) {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "default_parameter" => {
                    if let Some(value) = param.child_by_field_name("value") {
                        self.visit(value);
                    }
                }
                "typed_parameter" => {
                    if let Some(annotation) = param.child_by_field_name("type") {
                        self.visit(annotation);
                    }
                }
                "typed_default_parameter" => {
                    if let Some(annotation) = param.child_by_field_name("type") {
                        self.visit(annotation);
                    }
                    if let Some(value) = param.child_by_field_name("value") {
                        self.visit(value);
                    }
                }
                _ => {}
            }
        }
    }

    /// Assignment target: only `global` names count, everything else here binds
    fn visit_target(&mut self, node: Node) {
        match node.kind() {
            "identifier" => {
                if self.declared_global(self.text(node)) {
                    self.read(node, true);
                }
            }
            "attribute" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object);
                }
            }
            kind if TARGET_CONTAINERS.contains(&kind) => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit_target(child);
                }
            }
            _ => self.visit(node),
        }
    }

    /// `x += 1` reads `x` before writing it
    fn visit_augmented_target(&mut self, node: Node) {
        if node.kind() == "identifier" {
            let write = self.declared_global(self.text(node));
            self.read(node, write);
        } else {
            self.visit_target(node);
        }
    }

    fn read(&mut self, node: Node, write: bool) {
        let name = self.text(node);
        if name.is_empty() || !self.is_free(name) {
            return;
        }
        self.references.push(Reference {
            name: name.to_string(),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            write,
        });
    }

    fn is_free(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.globals.contains(name) {
                return true;
            }
            if scope.nonlocals.contains(name) {
                continue;
            }
            if scope.bound.contains(name) {
                return false;
            }
        }
        true
    }

    fn declared_global(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.globals.contains(name))
    }
}

fn collect_parameter_names(params: Node, source: &[u8], bound: &mut HashSet<String>) {
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "default_parameter" | "typed_default_parameter" => {
                if let Some(name) = param.child_by_field_name("name") {
                    collect_target_names(name, source, bound);
                }
            }
            "typed_parameter" => {
                let mut inner = param.walk();
                if let Some(first) = param.named_children(&mut inner).next() {
                    collect_target_names(first, source, bound);
                };
            }
            _ => collect_target_names(param, source, bound),
        }
    }
}

fn collect_target_names(node: Node, source: &[u8], bound: &mut HashSet<String>) {
    match node.kind() {
        "identifier" => {
            bound.insert(node_text(node, source).to_string());
        }
        kind if TARGET_CONTAINERS.contains(&kind) => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_target_names(child, source, bound);
            }
        }
        _ => {}
    }
}

/// Names a function body binds locally, without entering nested scopes
fn collect_bindings(node: Node, source: &[u8], scope: &mut Scope) {
    match node.kind() {
        "function_definition" | "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                scope.bound.insert(node_text(name, source).to_string());
            }
            return;
        }
        "lambda" => return,
        kind if COMPREHENSIONS.contains(&kind) => return,
        "assignment" | "augmented_assignment" | "for_statement" => {
            if let Some(left) = node.child_by_field_name("left") {
                collect_target_names(left, source, &mut scope.bound);
            }
        }
        "named_expression" => {
            if let Some(name) = node.child_by_field_name("name") {
                scope.bound.insert(node_text(name, source).to_string());
            }
        }
        "as_pattern" => {
            if let Some(alias) = node.child_by_field_name("alias") {
                collect_target_names(alias, source, &mut scope.bound);
            }
        }
        "except_clause" => {
            let mut after_as = false;
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if !child.is_named() {
                    after_as = child.kind() == "as";
                    continue;
                }
                if after_as {
                    collect_target_names(child, source, &mut scope.bound);
                }
                after_as = false;
            }
        }
        kind if is_import_kind(kind) => {
            for decl in import_decls(node, source, 0) {
                if let Some(name) = decl.bound_name() {
                    scope.bound.insert(name.to_string());
                }
            }
            return;
        }
        "global_statement" | "nonlocal_statement" => {
            let target = if node.kind() == "global_statement" {
                &mut scope.globals
            } else {
                &mut scope.nonlocals
            };
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "identifier" {
                    target.insert(node_text(child, source).to_string());
                }
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_bindings(child, source, scope);
    }
}

fn local_imports(root: Node, source: &[u8]) -> Vec<LocalImport> {
    let mut found = Vec::new();
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        let Some(definition) = definition_node(child) else {
            continue;
        };
        let Some(body) = definition.child_by_field_name("body") else {
            continue;
        };
        collect_block_imports(body, source, &mut found);

        if definition.kind() == "class_definition" {
            let mut members = body.walk();
            for member in body.named_children(&mut members) {
                let method = definition_node(member).filter(|n| n.kind() == "function_definition");
                if let Some(method_body) = method.and_then(|m| m.child_by_field_name("body")) {
                    collect_block_imports(method_body, source, &mut found);
                }
            }
        }
    }
    found.sort_by_key(|import| import.start_byte);
    found
}

fn collect_block_imports(block: Node, source: &[u8], found: &mut Vec<LocalImport>) {
    let mut cursor = block.walk();
    let statements: Vec<Node> = block
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    // A block must keep at least one statement
    if statements.len() < 2 {
        return;
    }
    let keeps_other = statements.iter().any(|n| !is_import_kind(n.kind()));
    let last = statements.len() - 1;
    for (position, statement) in statements.into_iter().enumerate() {
        if !is_import_kind(statement.kind()) || (!keeps_other && position == last) {
            continue;
        }
        if let Some((start_byte, end_byte)) = whole_line_range(statement, source) {
            found.push(LocalImport {
                start_byte,
                end_byte,
                decls: import_decls(statement, source, 0),
            });
        }
    }
}

/// Byte range of the full lines holding `node`, if nothing else shares them
fn whole_line_range(node: Node, source: &[u8]) -> Option<(usize, usize)> {
    let start = node.start_byte();
    let end = node.end_byte();
    let line_start = source[..start]
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos + 1);
    if !source[line_start..start]
        .iter()
        .all(|b| *b == b' ' || *b == b'\t')
    {
        return None;
    }

    let line_end = source[end..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(source.len(), |pos| end + pos + 1);
    let tail = String::from_utf8_lossy(&source[end..line_end]);
    let tail = tail.trim();
    if !tail.is_empty() && !tail.starts_with('#') {
        return None;
    }
    Some((line_start, line_end))
}
