use crate::category::ENTRY_FUNCTION;
use crate::classify::{BindingPlan, Placement};
use crate::layout::TreeLayout;
use crate::plan::{Bucket, BucketPlan};
use crate::rewrite::RewrittenUnit;
use crate::scaffold::{
    deferred_accessor, placeholder, wrap, write_back, DEFERRED_CACHE, PRELUDE_ALIAS,
    UNIT_ORDER_PREFIX,
};
use serde::Serialize;
use std::collections::BTreeMap;
use unitsplit_source_parser::{render_imports, ImportDecl, ImportKind, StructuralIndex, UnitKind};

/// Module name of the shared prelude
pub const PRELUDE_STEM: &str = "imports";

/// Module name of the deferred initialization file
pub const INIT_STEM: &str = "init";

const EXPORT_FILTER: &str = "__all__ = [_name for _name in dir() if _name not in ('__builtins__', '__cached__', '__doc__', '__file__', '__loader__', '__name__', '__package__', '__spec__', '__all__')]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Prelude,
    Unit,
    Package,
    Init,
    Entry,
}

/// One generated file, relative to the tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub kind: ArtifactKind,
    pub contents: String,
}

/// Inputs of the render stage
pub struct RenderInput<'a> {
    pub index: &'a StructuralIndex,
    pub plan: &'a BucketPlan,
    pub bindings: &'a BindingPlan,
    pub layout: &'a TreeLayout,

    /// Rewritten bodies for every unit emitted outside the prelude
    pub rewritten: &'a BTreeMap<usize, RewrittenUnit>,

    /// Source file name, for generated headers
    pub source_name: &'a str,

    pub entry_stem: &'a str,
}

impl RenderInput<'_> {
    /// Render every artifact: prelude, unit files, packages, init, entry
    pub fn render(&self) -> Vec<Artifact> {
        let mut artifacts = vec![self.prelude()];
        for bucket in &self.plan.buckets {
            artifacts.push(self.unit_file(bucket));
        }
        for category in self.plan.categories() {
            artifacts.push(self.package(category));
        }
        artifacts.push(self.init());
        artifacts.push(self.entry());
        artifacts
    }

    fn futures(&self) -> Vec<String> {
        let futures: Vec<ImportDecl> = self
            .index
            .imports()
            .filter(|decl| decl.kind == ImportKind::Future)
            .cloned()
            .collect();
        render_imports(&futures)
    }

    fn header(&self, role: &str) -> String {
        format!("# {role} generated by unitsplit from {}", self.source_name)
    }

    fn body_of(&self, unit: usize) -> &str {
        self.rewritten
            .get(&unit)
            .map_or(self.index.units[unit].raw_body.as_str(), |r| r.body.as_str())
    }

    fn prelude(&self) -> Artifact {
        let mut decls: Vec<ImportDecl> = self.index.imports().cloned().collect();
        for rewritten in self.rewritten.values() {
            decls.extend(rewritten.stripped_imports.iter().cloned());
        }

        let mut sections = vec![wrap(&[self.header("Shared prelude")])];
        let imports = render_imports(&decls);
        if !imports.is_empty() {
            sections.push(imports.join("\n"));
        }

        let conditional: Vec<&str> = self
            .bindings
            .units_at(Placement::PreludeImports)
            .into_iter()
            .map(|idx| self.index.units[idx].raw_body.as_str())
            .collect();
        if !conditional.is_empty() {
            sections.push(conditional.join("\n\n"));
        }

        let constants: Vec<&str> = self
            .bindings
            .units_at(Placement::Prelude)
            .into_iter()
            .map(|idx| self.index.units[idx].raw_body.as_str())
            .collect();
        if !constants.is_empty() {
            sections.push(join_units(&constants));
        }

        let mut tail: Vec<String> = self
            .bindings
            .deferred_names
            .iter()
            .map(|name| placeholder(name))
            .collect();
        tail.push(EXPORT_FILTER.to_string());
        sections.push(wrap(&tail));

        Artifact {
            path: format!("{PRELUDE_STEM}.py"),
            kind: ArtifactKind::Prelude,
            contents: finish(sections.join("\n\n")),
        }
    }

    fn unit_file(&self, bucket: &Bucket) -> Artifact {
        let units: Vec<&RewrittenUnit> = bucket
            .units
            .iter()
            .filter_map(|idx| self.rewritten.get(idx))
            .collect();

        let mut scaffold = vec![self.header(&format!("{}: unit file", bucket.file))];
        scaffold.extend(self.futures());
        scaffold.push(format!("from {PRELUDE_STEM} import *"));
        if units.iter().any(|unit| unit.uses_prelude) {
            scaffold.push(format!("import {PRELUDE_STEM} as {PRELUDE_ALIAS}"));
        }

        let imports: Vec<&ImportDecl> = units
            .iter()
            .flat_map(|unit| unit.imports.iter())
            .filter(|decl| decl.module != bucket.module)
            .collect();
        scaffold.extend(unit_import_lines(&imports));

        let mut accessors: Vec<String> = Vec::new();
        for target in units.iter().flat_map(|unit| unit.deferred.iter()) {
            let accessor = deferred_accessor(&target.name, &target.module);
            if !accessors.contains(&accessor) {
                accessors.push(accessor);
            }
        }
        if !accessors.is_empty() {
            scaffold.push(String::new());
            scaffold.push(format!("{DEFERRED_CACHE} = {{}}"));
            for accessor in accessors {
                scaffold.push(String::new());
                scaffold.push(accessor);
            }
        }

        let bodies: Vec<&str> = units.iter().map(|unit| unit.body.as_str()).collect();
        Artifact {
            path: bucket.file.clone(),
            kind: ArtifactKind::Unit,
            contents: finish(format!("{}\n\n\n{}", wrap(&scaffold), bodies.join("\n\n\n"))),
        }
    }

    fn package(&self, category: &str) -> Artifact {
        let stems: Vec<&str> = self
            .layout
            .files_in(category)
            .iter()
            .filter_map(|file| self.plan.bucket_by_file(file))
            .map(Bucket::stem)
            .collect();

        let mut scaffold = vec![
            self.header(&format!("{category} package")),
            format!("{UNIT_ORDER_PREFIX} {}", stems.join(", ")),
        ];
        for file in self.layout.eager_files(category) {
            if let Some(bucket) = self.plan.bucket_by_file(file) {
                scaffold.push(format!("from {} import {}", bucket.module, bucket.names.join(", ")));
            }
        }

        Artifact {
            path: format!("{category}/__init__.py"),
            kind: ArtifactKind::Package,
            contents: finish(wrap(&scaffold)),
        }
    }

    fn init(&self) -> Artifact {
        let units = self.bindings.units_at(Placement::Init);
        let imports: Vec<&ImportDecl> = units
            .iter()
            .filter_map(|idx| self.rewritten.get(idx))
            .flat_map(|unit| unit.imports.iter())
            .collect();

        let mut scaffold = vec![self.header("Deferred initialization")];
        scaffold.extend(self.futures());
        scaffold.push(format!("from {PRELUDE_STEM} import *"));
        scaffold.push(format!("import {PRELUDE_STEM} as {PRELUDE_ALIAS}"));
        scaffold.extend(unit_import_lines(&imports));

        let mut sections = vec![wrap(&scaffold)];
        for idx in units {
            let mut section = self.body_of(idx).to_string();
            if self.bindings.is_deferred_unit(idx) {
                section.push('\n');
                section.push_str(&wrap(&[write_back(self.index.units[idx].name())]));
            }
            sections.push(section);
        }

        Artifact {
            path: format!("{INIT_STEM}.py"),
            kind: ArtifactKind::Init,
            contents: finish(sections.join("\n\n")),
        }
    }

    /// A top-level statement already runs the entry function when init loads
    fn init_calls_entry(&self) -> bool {
        self.bindings.units_at(Placement::Init).into_iter().any(|idx| {
            let unit = &self.index.units[idx];
            matches!(unit.kind, UnitKind::Statement(_)) && unit.used_names.contains(ENTRY_FUNCTION)
        })
    }

    fn entry(&self) -> Artifact {
        let guards = self.bindings.units_at(Placement::Entry);
        let guard_units: Vec<&RewrittenUnit> =
            guards.iter().filter_map(|idx| self.rewritten.get(idx)).collect();

        let mut scaffold = vec![self.header("Entry point")];
        scaffold.extend(self.futures());
        scaffold.push("import os".to_string());
        scaffold.push("import sys".to_string());
        scaffold.push("sys.path.insert(0, os.path.dirname(os.path.abspath(__file__)))".to_string());
        scaffold.push(format!("from {PRELUDE_STEM} import *"));
        if guard_units.iter().any(|unit| unit.uses_prelude) {
            scaffold.push(format!("import {PRELUDE_STEM} as {PRELUDE_ALIAS}"));
        }

        let main = self
            .index
            .free_functions()
            .find(|unit| unit.is_named(ENTRY_FUNCTION))
            .and_then(|_| self.plan.owner(ENTRY_FUNCTION));
        let type_imports: Vec<ImportDecl> = self
            .index
            .type_definitions()
            .filter_map(|unit| {
                let name = unit.name.as_deref()?;
                let bucket = self.plan.owner(name)?;
                Some(ImportDecl::from_module(&bucket.module, name, None, unit.span.start))
            })
            .collect();
        let mut imports: Vec<&ImportDecl> = type_imports.iter().collect();
        imports.extend(
            guard_units
                .iter()
                .flat_map(|unit| unit.imports.iter())
                .filter(|decl| main.is_none() || decl.name.as_deref() != Some(ENTRY_FUNCTION)),
        );
        scaffold.extend(unit_import_lines(&imports));
        scaffold.push(format!("from {INIT_STEM} import *"));

        if let Some(bucket) = main {
            scaffold.push(format!("from {} import {ENTRY_FUNCTION}", bucket.module));
        }

        let mut sections = vec![wrap(&scaffold)];
        if guard_units.is_empty() {
            if main.is_some() && !self.init_calls_entry() {
                sections.push(wrap(&[
                    "if __name__ == '__main__':".to_string(),
                    format!("    {ENTRY_FUNCTION}()"),
                ]));
            }
        } else {
            sections.extend(guard_units.iter().map(|unit| unit.body.clone()));
        }

        Artifact {
            path: format!("{}.py", self.entry_stem),
            kind: ArtifactKind::Entry,
            contents: finish(sections.join("\n\n\n")),
        }
    }
}

/// `from module import a, b` lines, modules in first-reference order
fn unit_import_lines(decls: &[&ImportDecl]) -> Vec<String> {
    let mut modules: Vec<(&str, Vec<&str>)> = Vec::new();
    for decl in decls {
        let Some(name) = decl.name.as_deref() else {
            continue;
        };
        match modules.iter_mut().find(|(module, _)| *module == decl.module) {
            Some((_, names)) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            None => modules.push((decl.module.as_str(), vec![name])),
        }
    }
    modules
        .into_iter()
        .map(|(module, names)| format!("from {module} import {}", names.join(", ")))
        .collect()
}

/// Single-line units stay adjacent; multi-line units get a blank line around them
fn join_units(bodies: &[&str]) -> String {
    let mut joined = String::new();
    let mut previous_multiline = false;
    for (i, body) in bodies.iter().enumerate() {
        let multiline = body.contains('\n');
        if i > 0 {
            joined.push_str(if multiline || previous_multiline { "\n\n" } else { "\n" });
        }
        joined.push_str(body);
        previous_multiline = multiline;
    }
    joined
}

fn finish(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Entry module stem that shadows neither generated modules nor categories
#[must_use]
pub fn entry_stem(source_stem: &str, categories: &[&str]) -> String {
    let lowered = source_stem.to_lowercase();
    let clashes = lowered == PRELUDE_STEM
        || lowered == INIT_STEM
        || categories.iter().any(|c| c.eq_ignore_ascii_case(&lowered));
    if clashes {
        format!("{source_stem}_entry")
    } else {
        source_stem.to_string()
    }
}

/// Count units of each kind for stage traces
#[must_use]
pub fn count_kind(index: &StructuralIndex, kind: UnitKind) -> usize {
    index.units.iter().filter(|unit| unit.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_stem_avoids_clashes() {
        assert_eq!(entry_stem("app", &["core", "utils"]), "app");
        assert_eq!(entry_stem("imports", &["core"]), "imports_entry");
        assert_eq!(entry_stem("Init", &["core"]), "Init_entry");
        assert_eq!(entry_stem("utils", &["core", "utils"]), "utils_entry");
    }

    #[test]
    fn test_join_units() {
        assert_eq!(join_units(&["A = 1", "B = 2"]), "A = 1\nB = 2");
        assert_eq!(
            join_units(&["A = 1", "X = {\n    'a': 1,\n}", "B = 2"]),
            "A = 1\n\nX = {\n    'a': 1,\n}\n\nB = 2"
        );
    }

    #[test]
    fn test_unit_import_lines_keep_first_reference_order() {
        let a = ImportDecl::from_module("utils.utils", "f", None, 1);
        let b = ImportDecl::from_module("core.Base", "Base", None, 2);
        let c = ImportDecl::from_module("utils.utils", "g", None, 3);
        assert_eq!(
            unit_import_lines(&[&a, &b, &c, &a]),
            vec![
                "from utils.utils import f, g".to_string(),
                "from core.Base import Base".to_string(),
            ]
        );
    }
}
