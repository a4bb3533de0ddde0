use crate::classify::{BindingPlan, Placement};
use crate::error::{EngineError, Result};
use crate::layout::TreeLayout;
use crate::metadata::{DeferredReference, MetadataRecord, UnitStats};
use crate::plan::{Bucket, BucketPlan};
use crate::render::{count_kind, entry_stem, Artifact, RenderInput, INIT_STEM, PRELUDE_STEM};
use crate::report::{FailedArtifact, RunReport, StageTrace};
use crate::rewrite::{pinned_local_imports, Host, RewriteContext, RewrittenUnit};
use crate::writer::ArtifactWriter;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use unitsplit_graph::{DependencyGraph, DependencyResolver};
use unitsplit_source_parser::{BodyAnalysis, SourceParser, StructuralIndex, UnitKind};

/// A written bucket tree
#[derive(Debug, Clone)]
pub struct BucketTree {
    pub root: PathBuf,
    pub buckets: Vec<Bucket>,
    pub entry_file: String,
    pub metadata: MetadataRecord,
    pub written: Vec<String>,
    pub failed: Vec<FailedArtifact>,
    pub removed: Vec<String>,
}

/// Splits one source document into a bucket tree
pub struct Decomposer {
    parser: SourceParser,
}

impl Decomposer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: SourceParser::new()?,
        })
    }

    /// Parse, resolve, and decompose; every failure lands in the report
    pub fn run(&mut self, source: &Path, destination: &Path) -> RunReport {
        let mut report = RunReport::new("decompose");
        match self.run_stages(source, destination, &mut report) {
            Ok(tree) => {
                report.success = tree.failed.is_empty();
                report.written = tree.written;
                report.failed = tree.failed;
            }
            Err(err) => {
                log::error!("Decomposition of {} failed: {err}", source.display());
                report.error = Some(err.to_string());
            }
        }
        report
    }

    fn run_stages(
        &mut self,
        source: &Path,
        destination: &Path,
        report: &mut RunReport,
    ) -> Result<BucketTree> {
        if !source.is_file() {
            return Err(EngineError::SourceNotFound(source.to_path_buf()));
        }

        let index = self.parser.parse_file(source)?;
        report.record(
            StageTrace::new("parse")
                .count("lines", index.line_count)
                .count("units", index.units.len())
                .count("types", count_kind(&index, UnitKind::TypeDefinition))
                .count("functions", count_kind(&index, UnitKind::FreeFunction))
                .count("bindings", count_kind(&index, UnitKind::Binding))
                .count("imports", index.imports().count())
                .count("statements", index.statements().count()),
        );

        let graph = DependencyResolver::resolve(&index);
        report.record(
            StageTrace::new("resolve")
                .count("nodes", graph.node_count())
                .count("edges", graph.edge_count()),
        );

        self.decompose(&index, &graph, destination, report)
    }

    /// Lay out, rewrite, render, and write an already parsed document
    pub fn decompose(
        &mut self,
        index: &StructuralIndex,
        graph: &DependencyGraph,
        destination: &Path,
        report: &mut RunReport,
    ) -> Result<BucketTree> {
        let source_file = index.path.clone().unwrap_or_default();
        let source_path = Path::new(&source_file);
        let source_name = source_path
            .file_name()
            .map_or_else(|| "source.py".to_string(), |n| n.to_string_lossy().into_owned());
        let source_stem = source_path
            .file_stem()
            .map_or_else(|| "source".to_string(), |n| n.to_string_lossy().into_owned());

        let analyses = self.analyze(index)?;
        let cycles = graph.detect_cycles();
        for cycle in &cycles {
            report.warn(format!("Dependency cycle: {}", cycle.join(" -> ")));
        }

        let plan = BucketPlan::assign(index);
        report.record(
            StageTrace::new("plan")
                .count("buckets", plan.buckets.len())
                .count("categories", plan.categories().len())
                .count("cycles", cycles.len()),
        );

        let global_writes: BTreeSet<String> = analyses
            .iter()
            .filter(|(idx, _)| index.units[**idx].kind.is_definition())
            .flat_map(|(_, analysis)| analysis.global_writes())
            .map(str::to_string)
            .collect();
        let bindings = BindingPlan::classify(index, &global_writes);
        report.warnings.extend(bindings.warnings.iter().cloned());
        report.record(
            StageTrace::new("classify")
                .count("deferred", bindings.deferred.len())
                .count("live", bindings.live_names.len())
                .count("prelude", bindings.units_at(Placement::Prelude).len())
                .count("init", bindings.units_at(Placement::Init).len())
                .count("entry", bindings.units_at(Placement::Entry).len()),
        );

        let layout = TreeLayout::build(&plan, graph);
        let pinned = pinned_local_imports(index, &analyses);
        for name in &pinned {
            log::debug!("Keeping local imports of '{name}' inside their functions");
        }
        let ctx = RewriteContext {
            index,
            graph,
            plan: &plan,
            bindings: &bindings,
            layout: &layout,
            pinned_imports: &pinned,
        };
        let rewritten = rewrite_all(&ctx, &plan, &bindings, &analyses);
        let deferred = deferred_references(index, &rewritten);
        report.record(
            StageTrace::new("rewrite")
                .count("units", rewritten.len())
                .count("direct_imports", rewritten.values().map(|r| r.imports.len()).sum())
                .count("deferred", deferred.len())
                .count("stripped_imports", rewritten.values().map(|r| r.stripped_imports.len()).sum())
                .count("pinned_imports", pinned.len()),
        );

        let stem = entry_stem(&source_stem, &plan.categories());
        let artifacts = RenderInput {
            index,
            plan: &plan,
            bindings: &bindings,
            layout: &layout,
            rewritten: &rewritten,
            source_name: &source_name,
            entry_stem: &stem,
        }
        .render();
        report.record(StageTrace::new("render").count("artifacts", artifacts.len()));

        let mut writer = ArtifactWriter::create(destination)?;
        let previous = match MetadataRecord::read(destination) {
            Ok(previous) => previous,
            Err(err) => {
                report.warn(format!("Ignoring unreadable metadata: {err}"));
                None
            }
        };
        let current: HashSet<&str> = artifacts.iter().map(|a| a.path.as_str()).collect();
        let removed = previous
            .map(|record| writer.remove_stale(&record.artifacts, &current))
            .unwrap_or_default();
        for artifact in &artifacts {
            writer.write(artifact);
        }

        let entry_file = format!("{stem}.py");
        let metadata = MetadataRecord {
            source_file,
            source_name: source_stem,
            target_dir: destination.display().to_string(),
            class_order: index.unit_order(),
            module_mapping: module_mapping(index, &plan, &bindings),
            total_classes: count_kind(index, UnitKind::TypeDefinition),
            total_functions: count_kind(index, UnitKind::FreeFunction),
            total_imports: index.imports().count(),
            total_constants: count_kind(index, UnitKind::Binding),
            global_init: global_init(index, &bindings),
            category_order: layout.category_order.clone(),
            categories: layout.file_order.clone(),
            entry_file: Some(entry_file.clone()),
            cycles,
            deferred_references: deferred,
            artifacts: artifact_paths(&artifacts),
            unit_stats: unit_stats(index, graph, &plan, &bindings)?,
            generator: format!("unitsplit {}", env!("CARGO_PKG_VERSION")),
        };
        if let Err(err) = metadata.write(destination) {
            log::error!("Failed to write metadata: {err}");
            writer.record_failure(
                format!("{}/{}", crate::metadata::METADATA_DIR, crate::metadata::METADATA_FILE),
                err.to_string(),
            );
        }

        let root = writer.root().to_path_buf();
        let (written, failed) = writer.into_outcome();
        report.record(
            StageTrace::new("write")
                .count("written", written.len())
                .count("failed", failed.len())
                .count("removed", removed.len()),
        );

        Ok(BucketTree {
            root,
            buckets: plan.buckets,
            entry_file,
            metadata,
            written,
            failed,
            removed,
        })
    }

    /// Scope analysis of every non-import unit, each parsed alone
    fn analyze(&mut self, index: &StructuralIndex) -> Result<BTreeMap<usize, BodyAnalysis>> {
        let mut analyses = BTreeMap::new();
        for (idx, unit) in index.units.iter().enumerate() {
            if unit.kind == UnitKind::Import {
                continue;
            }
            analyses.insert(idx, self.parser.analyze_body(&unit.raw_body)?);
        }
        Ok(analyses)
    }
}

fn rewrite_all(
    ctx: &RewriteContext<'_>,
    plan: &BucketPlan,
    bindings: &BindingPlan,
    analyses: &BTreeMap<usize, BodyAnalysis>,
) -> BTreeMap<usize, RewrittenUnit> {
    let mut rewritten = BTreeMap::new();
    for (idx, analysis) in analyses {
        let host = if plan.unit_bucket(*idx).is_some() {
            Host::Bucket
        } else {
            match bindings.placement(*idx) {
                Some(Placement::Init) => Host::Init,
                Some(Placement::Entry) => Host::Entry,
                _ => continue,
            }
        };
        rewritten.insert(*idx, ctx.rewrite(*idx, analysis, host));
    }
    rewritten
}

fn deferred_references(
    index: &StructuralIndex,
    rewritten: &BTreeMap<usize, RewrittenUnit>,
) -> Vec<DeferredReference> {
    let mut references: Vec<DeferredReference> = rewritten
        .values()
        .flat_map(|unit| {
            let from = index.units[unit.unit].name();
            unit.deferred.iter().map(move |target| DeferredReference {
                from: from.to_string(),
                to: target.name.clone(),
                module: target.module.clone(),
            })
        })
        .collect();
    references.sort();
    references.dedup();
    references
}

fn module_mapping(
    index: &StructuralIndex,
    plan: &BucketPlan,
    bindings: &BindingPlan,
) -> BTreeMap<String, String> {
    let mut mapping: BTreeMap<String, String> = plan
        .module_mapping()
        .map(|(name, file)| (name.to_string(), file.to_string()))
        .collect();
    for unit in index.bindings() {
        let name = unit.name();
        if mapping.contains_key(name) {
            continue;
        }
        let file = if bindings.deferred_names.contains(name) {
            INIT_STEM
        } else {
            PRELUDE_STEM
        };
        mapping.insert(name.to_string(), format!("{file}.py"));
    }
    mapping
}

fn global_init(index: &StructuralIndex, bindings: &BindingPlan) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for idx in &bindings.deferred {
        let name = index.units[*idx].name();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

fn artifact_paths(artifacts: &[Artifact]) -> Vec<String> {
    artifacts.iter().map(|a| a.path.clone()).collect()
}

fn unit_stats(
    index: &StructuralIndex,
    graph: &DependencyGraph,
    plan: &BucketPlan,
    bindings: &BindingPlan,
) -> Result<BTreeMap<String, UnitStats>> {
    let mut stats = BTreeMap::new();
    for (idx, unit) in index.units.iter().enumerate() {
        let Some(name) = unit.name.as_deref() else {
            continue;
        };
        let (file, dependencies, dependents) = match plan.unit_bucket(idx) {
            Some(bucket) => (
                plan.buckets[bucket].file.clone(),
                graph.dependencies(name)?.len(),
                graph.dependents(name)?.len(),
            ),
            None => {
                let file = if bindings.is_deferred_unit(idx) {
                    INIT_STEM
                } else {
                    PRELUDE_STEM
                };
                (format!("{file}.py"), unit.used_names.len(), 0)
            }
        };
        stats.insert(
            name.to_string(),
            UnitStats {
                kind: unit.kind.as_str().to_string(),
                file,
                start_line: unit.span.start,
                end_line: unit.span.end,
                dependencies,
                dependents,
            },
        );
    }
    Ok(stats)
}
