use crate::imports::ImportDecl;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Inclusive line range in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    /// Start line (1-indexed)
    pub start: usize,

    /// End line (1-indexed, inclusive)
    pub end: usize,
}

impl LineSpan {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Get the number of lines in this span
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    /// Check if span contains a specific line
    #[must_use]
    pub const fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// What a non-definition top-level statement is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementRole {
    /// Any other statement (calls, docstrings, chained assignments, loops)
    Plain,

    /// `try`/`if` block wrapping imports
    ConditionalImport,

    /// `if __name__ == "__main__":`
    EntryGuard,
}

/// Kind of top-level unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    TypeDefinition,
    FreeFunction,
    Binding,
    Import,
    Statement(StatementRole),
}

impl UnitKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TypeDefinition => "type",
            Self::FreeFunction => "function",
            Self::Binding => "binding",
            Self::Import => "import",
            Self::Statement(StatementRole::Plain) => "statement",
            Self::Statement(StatementRole::ConditionalImport) => "conditional_import",
            Self::Statement(StatementRole::EntryGuard) => "entry_guard",
        }
    }

    /// Types and free functions get their own generated files
    #[must_use]
    pub const fn is_definition(&self) -> bool {
        matches!(self, Self::TypeDefinition | Self::FreeFunction)
    }
}

/// One extractable piece of top-level code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub kind: UnitKind,

    /// Type, function or binding name; `None` for imports and statements
    pub name: Option<String>,

    /// Exact line bounds from the syntax tree
    pub span: LineSpan,

    /// Verbatim source lines for `span`
    pub raw_body: String,

    /// Head names of declared supertypes (types only)
    pub base_refs: Vec<String>,

    /// Free references that match another unit's name
    pub used_names: BTreeSet<String>,

    /// Called name when a binding's value is `name(...)`
    pub initializer: Option<String>,

    /// Import declarations held by this unit (top-level or nested in a block)
    pub imports: Vec<ImportDecl>,
}

impl SourceUnit {
    pub(crate) fn new(kind: UnitKind, span: LineSpan, raw_body: String) -> Self {
        Self {
            kind,
            name: None,
            span,
            raw_body,
            base_refs: Vec::new(),
            used_names: BTreeSet::new(),
            initializer: None,
            imports: Vec::new(),
        }
    }

    /// Unit name, or an empty string for unnamed units
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

/// Parsed view of one document: every top-level unit in source order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralIndex {
    /// Source document path, when parsed from disk
    pub path: Option<String>,

    /// Number of lines in the normalized document
    pub line_count: usize,

    pub units: Vec<SourceUnit>,
}

impl StructuralIndex {
    /// Top-level import declarations in source order
    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.units
            .iter()
            .filter(|unit| unit.kind == UnitKind::Import)
            .flat_map(|unit| unit.imports.iter())
    }

    pub fn type_definitions(&self) -> impl Iterator<Item = &SourceUnit> {
        self.of_kind(UnitKind::TypeDefinition)
    }

    pub fn free_functions(&self) -> impl Iterator<Item = &SourceUnit> {
        self.of_kind(UnitKind::FreeFunction)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &SourceUnit> {
        self.of_kind(UnitKind::Binding)
    }

    pub fn statements(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units
            .iter()
            .filter(|unit| matches!(unit.kind, UnitKind::Statement(_)))
    }

    /// Names of types and free functions
    #[must_use]
    pub fn definition_names(&self) -> HashSet<&str> {
        self.units
            .iter()
            .filter(|unit| unit.kind.is_definition())
            .filter_map(|unit| unit.name.as_deref())
            .collect()
    }

    /// Named units (types, functions, bindings) in first-seen order, without repeats
    #[must_use]
    pub fn unit_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.units
            .iter()
            .filter_map(|unit| unit.name.as_deref())
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Last definition of `name`; later definitions shadow earlier ones
    #[must_use]
    pub fn find_definition(&self, name: &str) -> Option<&SourceUnit> {
        self.units
            .iter()
            .rev()
            .find(|unit| unit.kind.is_definition() && unit.is_named(name))
    }

    fn of_kind(&self, kind: UnitKind) -> impl Iterator<Item = &SourceUnit> {
        self.units.iter().filter(move |unit| unit.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_overlap() {
        let a = LineSpan::new(1, 4);
        assert!(a.overlaps(&LineSpan::new(4, 6)));
        assert!(!a.overlaps(&LineSpan::new(5, 6)));
        assert_eq!(a.line_count(), 4);
        assert!(a.contains(4));
        assert!(!a.contains(5));
    }

    #[test]
    fn test_unit_order_skips_repeats() {
        let mut index = StructuralIndex::default();
        for (kind, name) in [
            (UnitKind::Binding, "DEBUG"),
            (UnitKind::TypeDefinition, "App"),
            (UnitKind::Binding, "DEBUG"),
        ] {
            let mut unit = SourceUnit::new(kind, LineSpan::new(1, 1), String::new());
            unit.name = Some(name.to_string());
            index.units.push(unit);
        }

        assert_eq!(index.unit_order(), vec!["DEBUG", "App"]);
        assert_eq!(index.bindings().count(), 2);
        assert!(index.definition_names().contains("App"));
        assert!(!index.definition_names().contains("DEBUG"));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(UnitKind::TypeDefinition.as_str(), "type");
        assert_eq!(
            UnitKind::Statement(StatementRole::EntryGuard).as_str(),
            "entry_guard"
        );
        assert!(UnitKind::FreeFunction.is_definition());
        assert!(!UnitKind::Binding.is_definition());
    }
}
