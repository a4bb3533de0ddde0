use crate::classify::BindingPlan;
use crate::layout::TreeLayout;
use crate::plan::BucketPlan;
use crate::scaffold::{DEFERRED_PREFIX, PRELUDE_ALIAS};
use std::collections::{BTreeMap, BTreeSet};
use unitsplit_graph::DependencyGraph;
use unitsplit_source_parser::{BodyAnalysis, ImportDecl, LocalImport, StructuralIndex};

/// File a rewritten unit lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    /// A category unit file
    Bucket,
    Init,
    Entry,
}

/// Target reached through a deferred accessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredTarget {
    pub name: String,
    pub module: String,
}

/// A unit body after reference rewriting, plus what its file must declare
#[derive(Debug, Clone, Default)]
pub struct RewrittenUnit {
    pub unit: usize,
    pub body: String,

    /// Unit imports, in first-reference order
    pub imports: Vec<ImportDecl>,

    pub deferred: Vec<DeferredTarget>,

    /// Body reads or writes a live binding through the prelude alias
    pub uses_prelude: bool,

    /// Function-local imports removed from the body
    pub stripped_imports: Vec<ImportDecl>,
}

impl RewrittenUnit {
    fn import(&mut self, module: &str, name: &str, line: usize) {
        let exists = self
            .imports
            .iter()
            .any(|decl| decl.module == module && decl.name.as_deref() == Some(name));
        if !exists {
            self.imports
                .push(ImportDecl::from_module(module, name, None, line));
        }
    }

    fn defer(&mut self, module: &str, name: &str) {
        if !self.deferred.iter().any(|target| target.name == name) {
            self.deferred.push(DeferredTarget {
                name: name.to_string(),
                module: module.to_string(),
            });
        }
    }
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Everything reference rewriting needs to know about the tree
pub struct RewriteContext<'a> {
    pub index: &'a StructuralIndex,
    pub graph: &'a DependencyGraph,
    pub plan: &'a BucketPlan,
    pub bindings: &'a BindingPlan,
    pub layout: &'a TreeLayout,

    /// Names whose function-local imports stay in place
    pub pinned_imports: &'a BTreeSet<String>,
}

impl RewriteContext<'_> {
    /// Rewrite one unit body for the file it is emitted into
    pub fn rewrite(&self, unit_idx: usize, analysis: &BodyAnalysis, host: Host) -> RewrittenUnit {
        let unit = &self.index.units[unit_idx];
        let own_bucket = self.plan.unit_bucket(unit_idx);
        let mut out = RewrittenUnit {
            unit: unit_idx,
            ..RewrittenUnit::default()
        };
        let mut edits = Vec::new();

        if host == Host::Bucket {
            for local in &analysis.local_imports {
                if self.is_pinned(local) {
                    continue;
                }
                edits.push(Edit {
                    start: local.start_byte,
                    end: local.end_byte,
                    replacement: String::new(),
                });
                out.stripped_imports.extend(local.decls.iter().cloned());
            }
        }

        for reference in &analysis.references {
            let target = reference.name.as_str();

            if let Some(target_idx) = self.plan.owner_index(target) {
                if reference.write || unit.is_named(target) {
                    continue;
                }
                if host == Host::Bucket && own_bucket == Some(target_idx) {
                    continue;
                }
                let target_bucket = &self.plan.buckets[target_idx];
                let deferred = match (host, own_bucket) {
                    (Host::Bucket, Some(own)) => self.closes_cycle(
                        unit.name(),
                        target,
                        &self.plan.buckets[own].file,
                        &target_bucket.file,
                    ),
                    _ => false,
                };
                if deferred {
                    out.defer(&target_bucket.module, target);
                    edits.push(Edit {
                        start: reference.start_byte,
                        end: reference.end_byte,
                        replacement: format!("{DEFERRED_PREFIX}{target}()"),
                    });
                } else {
                    out.import(&target_bucket.module, target, unit.span.start);
                }
            } else if self.bindings.live_names.contains(target) {
                if host == Host::Init && self.bindings.deferred_names.contains(target) {
                    continue;
                }
                out.uses_prelude = true;
                edits.push(Edit {
                    start: reference.start_byte,
                    end: reference.end_byte,
                    replacement: format!("{PRELUDE_ALIAS}.{target}"),
                });
            }
        }

        out.body = apply_edits(&unit.raw_body, edits);
        out
    }

    fn is_pinned(&self, local: &LocalImport) -> bool {
        local
            .decls
            .iter()
            .any(|decl| decl.bound_name().map_or(true, |name| self.pinned_imports.contains(name)))
    }

    /// Unit-level reachability, or file-level reachability between distinct files
    fn closes_cycle(&self, from: &str, to: &str, from_file: &str, to_file: &str) -> bool {
        self.graph.would_create_cycle(from, to) || self.layout.closes_file_cycle(from_file, to_file)
    }
}

/// Names bound by function-local imports that would change meaning in the
/// shared prelude.
///
/// A local import moves to the prelude only when its name is not a top-level
/// unit, is not read freely anywhere, and every other import of that name
/// renders the same.
pub fn pinned_local_imports(
    index: &StructuralIndex,
    analyses: &BTreeMap<usize, BodyAnalysis>,
) -> BTreeSet<String> {
    let mut renders: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for decl in index.imports() {
        if let Some(name) = decl.bound_name() {
            renders.entry(name).or_default().insert(decl.render());
        }
    }
    let top_level: BTreeSet<&str> = renders.keys().copied().collect();

    let mut local_names: BTreeSet<&str> = BTreeSet::new();
    for analysis in analyses.values() {
        for decl in analysis.local_imports.iter().flat_map(|local| local.decls.iter()) {
            if let Some(name) = decl.bound_name() {
                local_names.insert(name);
                renders.entry(name).or_default().insert(decl.render());
            }
        }
    }

    let free: BTreeSet<String> = analyses.values().flat_map(BodyAnalysis::free_names).collect();
    let unit_names: BTreeSet<&str> = index.units.iter().filter_map(|u| u.name.as_deref()).collect();

    local_names
        .into_iter()
        .filter(|name| {
            let conflicting = renders.get(name).is_some_and(|set| set.len() > 1);
            let shadowed_read = free.contains(*name) && !top_level.contains(name);
            unit_names.contains(name) || conflicting || shadowed_read
        })
        .map(str::to_string)
        .collect()
}

fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    let mut rewritten = text.to_string();
    for edit in edits {
        if edit.start <= edit.end && edit.end <= rewritten.len() {
            rewritten.replace_range(edit.start..edit.end, &edit.replacement);
        }
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use unitsplit_graph::DependencyResolver;
    use unitsplit_source_parser::{SourceParser, UnitKind};

    struct Fixture {
        parser: SourceParser,
        index: StructuralIndex,
        graph: DependencyGraph,
        plan: BucketPlan,
        bindings: BindingPlan,
        layout: TreeLayout,
        pinned: BTreeSet<String>,
    }

    impl Fixture {
        fn new(source: &str, global_writes: &[&str]) -> Self {
            let mut parser = SourceParser::new().unwrap();
            let index = parser.parse(source).unwrap();
            let graph = DependencyResolver::resolve(&index);
            let plan = BucketPlan::assign(&index);
            let writes: BTreeSet<String> = global_writes.iter().map(|s| s.to_string()).collect();
            let bindings = BindingPlan::classify(&index, &writes);
            let layout = TreeLayout::build(&plan, &graph);
            let analyses: BTreeMap<usize, BodyAnalysis> = index
                .units
                .iter()
                .enumerate()
                .filter(|(_, unit)| unit.kind != UnitKind::Import)
                .map(|(idx, unit)| (idx, parser.analyze_body(&unit.raw_body).unwrap()))
                .collect();
            let pinned = pinned_local_imports(&index, &analyses);
            Self {
                parser,
                index,
                graph,
                plan,
                bindings,
                layout,
                pinned,
            }
        }

        fn rewrite(&mut self, name: &str, host: Host) -> RewrittenUnit {
            let idx = self
                .index
                .units
                .iter()
                .position(|u| u.is_named(name))
                .unwrap();
            let analysis = self.parser.analyze_body(&self.index.units[idx].raw_body).unwrap();
            let ctx = RewriteContext {
                index: &self.index,
                graph: &self.graph,
                plan: &self.plan,
                bindings: &self.bindings,
                layout: &self.layout,
                pinned_imports: &self.pinned,
            };
            ctx.rewrite(idx, &analysis, host)
        }
    }

    #[test]
    fn test_acyclic_reference_is_direct_import() {
        let mut fixture = Fixture::new(
            "class Base:\n    pass\n\nclass Derived(Base):\n    pass\n",
            &[],
        );
        let derived = fixture.rewrite("Derived", Host::Bucket);

        assert_eq!(derived.body, "class Derived(Base):\n    pass");
        assert_eq!(derived.imports.len(), 1);
        assert_eq!(derived.imports[0].render(), "from core.Base import Base");
        assert!(derived.deferred.is_empty());
    }

    #[test]
    fn test_cycle_uses_deferred_accessors() {
        let mut fixture = Fixture::new(
            "class A:\n    def go(self):\n        return f()\n\n\
             def f():\n    return isinstance(1, A)\n",
            &[],
        );

        let a = fixture.rewrite("A", Host::Bucket);
        assert_eq!(a.body, "class A:\n    def go(self):\n        return _deferred_f()()");
        assert_eq!(
            a.deferred,
            vec![DeferredTarget {
                name: "f".to_string(),
                module: "utils.utils".to_string()
            }]
        );

        let f = fixture.rewrite("f", Host::Bucket);
        assert_eq!(f.body, "def f():\n    return isinstance(1, _deferred_A())");
        assert!(f.imports.is_empty());
    }

    #[test]
    fn test_same_file_reference_is_untouched() {
        let mut fixture = Fixture::new(
            "def helper():\n    return 1\n\ndef other():\n    return helper()\n",
            &[],
        );
        let other = fixture.rewrite("other", Host::Bucket);
        assert_eq!(other.body, "def other():\n    return helper()");
        assert!(other.imports.is_empty());
    }

    #[test]
    fn test_live_names_go_through_prelude() {
        let mut fixture = Fixture::new(
            "COUNTER = 0\n\ndef bump():\n    global COUNTER\n    COUNTER += 1\n    return COUNTER\n",
            &["COUNTER"],
        );
        let bump = fixture.rewrite("bump", Host::Bucket);
        assert!(bump.uses_prelude);
        assert_eq!(
            bump.body,
            "def bump():\n    global COUNTER\n    _prelude.COUNTER += 1\n    return _prelude.COUNTER"
        );
    }

    #[test]
    fn test_local_imports_are_stripped() {
        let mut fixture = Fixture::new(
            "def load(path):\n    import json\n    return json.load(open(path))\n",
            &[],
        );
        let load = fixture.rewrite("load", Host::Bucket);
        assert_eq!(load.body, "def load(path):\n    return json.load(open(path))");
        assert_eq!(load.stripped_imports.len(), 1);
        assert_eq!(load.stripped_imports[0].render(), "import json");
    }

    #[test]
    fn test_init_statement_keeps_deferred_names() {
        let mut fixture = Fixture::new(
            "class App:\n    pass\n\napp = App()\n",
            &[],
        );
        let app = fixture.rewrite("app", Host::Init);
        assert_eq!(app.body, "app = App()");
        assert_eq!(app.imports[0].render(), "from core.App import App");
        assert!(!app.uses_prelude);
    }

    #[test]
    fn test_local_import_shadowing_a_unit_stays_local() {
        let mut fixture = Fixture::new(
            "def parse(text):\n    return 'user:' + text\n\n\
             def load(text):\n    from json import loads as parse\n    return parse(text)\n",
            &[],
        );
        assert!(fixture.pinned.contains("parse"));

        let load = fixture.rewrite("load", Host::Bucket);
        assert_eq!(
            load.body,
            "def load(text):\n    from json import loads as parse\n    return parse(text)"
        );
        assert!(load.stripped_imports.is_empty());
    }

    #[test]
    fn test_conflicting_local_imports_stay_local() {
        let fixture = Fixture::new(
            "def a():\n    from os.path import join\n    return join('x', 'y')\n\n\
             def b():\n    from shlex import join\n    return join(['x'])\n\n\
             def c():\n    import json\n    return json.dumps(1)\n",
            &[],
        );
        assert!(fixture.pinned.contains("join"));
        assert!(!fixture.pinned.contains("json"));
    }

    #[test]
    fn test_local_import_of_a_name_read_elsewhere_stays_local() {
        let fixture = Fixture::new(
            "def a(path):\n    from io import open\n    return open(path)\n\n\
             def b(path):\n    return open(path)\n",
            &[],
        );
        assert!(fixture.pinned.contains("open"));
    }
}
