use crate::category::CATEGORY_PRIORITY;
use crate::cleanup::apply_cleanup_preserving;
use crate::config::RecomposeConfig;
use crate::error::{EngineError, Result};
use crate::metadata::{MetadataRecord, METADATA_DIR};
use crate::render::{INIT_STEM, PRELUDE_STEM};
use crate::report::{RunReport, StageTrace};
use crate::scaffold::{strip_scaffold, DEFERRED_PREFIX, PRELUDE_ALIAS, UNIT_ORDER_PREFIX};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use unitsplit_source_parser::{normalize_source, render_imports, ImportDecl, ImportKind, SourceParser, UnitKind};
use walkdir::WalkDir;

/// Roots emitted in the first import tier
const FAMILIAR_MODULES: &[&str] = &[
    "abc", "argparse", "ast", "asyncio", "base64", "bisect", "calendar", "collections",
    "concurrent", "configparser", "contextlib", "copy", "csv", "ctypes", "dataclasses",
    "datetime", "decimal", "difflib", "enum", "errno", "fnmatch", "fractions", "functools",
    "gc", "getpass", "glob", "gzip", "hashlib", "heapq", "hmac", "html", "http", "importlib",
    "inspect", "io", "itertools", "json", "locale", "logging", "math", "mimetypes",
    "multiprocessing", "operator", "os", "pathlib", "pickle", "platform", "pprint", "queue",
    "random", "re", "secrets", "select", "shlex", "shutil", "signal", "socket", "sqlite3",
    "ssl", "stat", "statistics", "string", "struct", "subprocess", "sys", "tempfile",
    "textwrap", "threading", "time", "timeit", "tkinter", "traceback", "types", "typing",
    "unittest", "urllib", "uuid", "warnings", "weakref", "xml", "zipfile", "zlib",
];

/// Root files placed first when no metadata is used
const LEADING_FILES: [&str; 2] = ["imports.py", "config.py"];

static ENTRY_GUARD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^if\s+__name__\s*==\s*['"]__main__['"]\s*:"#)
        .expect("entry guard line pattern is valid")
});

static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:import|from)\s").expect("import line pattern is valid"));

static DEFERRED_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b{DEFERRED_PREFIX}([A-Za-z_][A-Za-z0-9_]*)\(\)"))
        .expect("deferred call pattern is valid")
});

static PRELUDE_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b{PRELUDE_ALIAS}\.([A-Za-z_][A-Za-z0-9_]*)"))
        .expect("prelude attribute pattern is valid")
});

/// Which ordering produced a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    Metadata,
    Default,
}

/// A written recomposed document
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
    pub sha256: String,

    /// Tree-relative files in emitted order
    pub included: Vec<String>,

    /// Files whose body was empty after stripping
    pub skipped: Vec<String>,

    pub order: OrderSource,
}

/// One unit file with generated code and imports removed
#[derive(Debug, Default)]
struct StrippedFile {
    imports: Vec<ImportDecl>,
    raw_imports: Vec<String>,
    body: String,
    reversed: usize,
    fallback: bool,
}

/// Joins a bucket tree back into one document
pub struct Recomposer {
    parser: SourceParser,
    config: RecomposeConfig,
}

impl Recomposer {
    pub fn new(config: RecomposeConfig) -> Result<Self> {
        config.validate().map_err(EngineError::invalid_config)?;
        Ok(Self {
            parser: SourceParser::new()?,
            config,
        })
    }

    pub fn config(&self) -> &RecomposeConfig {
        &self.config
    }

    /// Recompose and report; every failure lands in the report
    pub fn run(&mut self, tree: &Path, output: &Path) -> RunReport {
        let mut report = RunReport::new("recompose");
        match self.recompose(tree, output, &mut report) {
            Ok(document) => {
                report.success = true;
                report.written.push(document.path.display().to_string());
            }
            Err(err) => {
                log::error!("Recomposition of {} failed: {err}", tree.display());
                report.error = Some(err.to_string());
            }
        }
        report
    }

    pub fn recompose(&mut self, tree: &Path, output: &Path, report: &mut RunReport) -> Result<Document> {
        if !tree.is_dir() {
            return Err(EngineError::SourceNotFound(tree.to_path_buf()));
        }

        let files = discover(tree, output, report);
        if files.is_empty() {
            return Err(EngineError::EmptyTree(tree.to_path_buf()));
        }
        report.record(StageTrace::new("discover").count("files", files.len()));

        let metadata = if self.config.use_metadata {
            MetadataRecord::read(tree).unwrap_or_else(|err| {
                report.warn(format!("Ignoring unreadable metadata: {err}"));
                None
            })
        } else {
            None
        };

        let mut texts: BTreeMap<String, String> = BTreeMap::new();
        for file in files {
            match std::fs::read_to_string(tree.join(&file)) {
                Ok(text) => {
                    texts.insert(file, normalize_source(&text));
                }
                Err(err) => report.warn(format!("Skipping unreadable {file}: {err}")),
            }
        }

        let (order, order_source) = match metadata.as_ref().filter(|m| metadata_applies(m, &texts)) {
            Some(record) => (metadata_order(record, &texts), OrderSource::Metadata),
            None => {
                if metadata.is_some() {
                    report.warn("Metadata maps no file present in the tree; using default order");
                }
                (default_order(tree, &texts), OrderSource::Default)
            }
        };
        report.record(
            StageTrace::new("order")
                .count("files", order.len())
                .count("metadata", usize::from(order_source == OrderSource::Metadata)),
        );

        let internal = internal_roots(&texts);
        let mut decls: Vec<ImportDecl> = Vec::new();
        let mut raw_imports: Vec<String> = Vec::new();
        let mut bodies: Vec<(String, String)> = Vec::new();
        let mut skipped = Vec::new();
        let mut reversed = 0;
        let mut fallbacks = 0;

        for file in &order {
            let Some(text) = texts.get(file) else {
                continue;
            };
            let stripped = self.strip_file(file, text, report);
            reversed += stripped.reversed;
            fallbacks += usize::from(stripped.fallback);
            decls.extend(
                stripped
                    .imports
                    .into_iter()
                    .filter(|decl| !is_internal(decl, &internal)),
            );
            for raw in stripped.raw_imports {
                if !raw_imports.contains(&raw) {
                    raw_imports.push(raw);
                }
            }
            if stripped.body.trim().is_empty() {
                log::info!("Skipping {file}: empty after stripping");
                skipped.push(file.clone());
            } else {
                bodies.push((file.clone(), stripped.body));
            }
        }
        report.record(
            StageTrace::new("strip")
                .count("imports", decls.len())
                .count("reversed", reversed)
                .count("fallback", fallbacks)
                .count("skipped", skipped.len()),
        );

        let tree_name = tree
            .file_name()
            .map_or_else(|| tree.display().to_string(), |n| n.to_string_lossy().into_owned());
        let assembled = assemble(&tree_name, &decls, &raw_imports, &bodies, self.config.banner_width);
        let text = if self.config.cleanup.is_enabled() {
            let preserved = self
                .parser
                .multiline_string_lines(&assembled)
                .unwrap_or_else(|err| {
                    report.warn(format!(
                        "Cleanup cannot locate string literals ({err}); cleaning every line"
                    ));
                    BTreeSet::new()
                });
            apply_cleanup_preserving(&assembled, &self.config.cleanup, &preserved)
        } else {
            assembled
        };
        report.record(
            StageTrace::new("assemble")
                .count("bodies", bodies.len())
                .count("bytes", text.len()),
        );

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        std::fs::write(output, &text).map_err(|e| EngineError::io(output, e))?;
        let sha256 = digest(text.as_bytes());
        let integrity_warnings = verify_written(output, text.len(), &sha256);
        for warning in &integrity_warnings {
            report.warn(warning.clone());
        }
        report.record(
            StageTrace::new("write")
                .count("bytes", text.len())
                .count("integrity_warnings", integrity_warnings.len()),
        );

        Ok(Document {
            path: output.to_path_buf(),
            text,
            sha256,
            included: bodies.into_iter().map(|(file, _)| file).collect(),
            skipped,
            order: order_source,
        })
    }

    fn strip_file(&mut self, file: &str, text: &str, report: &mut RunReport) -> StrippedFile {
        let (without_scaffold, _) = strip_scaffold(text);
        match self.parser.parse(&without_scaffold) {
            Ok(index) => {
                let import_spans: Vec<_> = index
                    .units
                    .iter()
                    .filter(|unit| unit.kind == UnitKind::Import)
                    .map(|unit| unit.span)
                    .collect();
                let body: Vec<&str> = without_scaffold
                    .lines()
                    .enumerate()
                    .filter(|(i, _)| !import_spans.iter().any(|span| span.contains(i + 1)))
                    .map(|(_, line)| line)
                    .collect();
                let (body, reversed) = self.reverse_generated(&trim_blank_edges(&body));
                StrippedFile {
                    imports: index.imports().cloned().collect(),
                    raw_imports: Vec::new(),
                    body,
                    reversed,
                    fallback: false,
                }
            }
            Err(err) => {
                report.warn(format!("{file}: {err}; stripping imports line by line"));
                self.strip_lines(&without_scaffold)
            }
        }
    }

    /// Undo deferred accessor calls and prelude-qualified names
    fn reverse_generated(&mut self, body: &str) -> (String, usize) {
        let Ok(analysis) = self.parser.analyze_body(body) else {
            return reverse_with_patterns(body);
        };

        let mut edits: Vec<(usize, usize, String)> = Vec::new();
        for reference in &analysis.references {
            let rest = &body[reference.end_byte..];
            if let Some(name) = reference.name.strip_prefix(DEFERRED_PREFIX) {
                if rest.starts_with("()") && !name.is_empty() {
                    edits.push((reference.start_byte, reference.end_byte + 2, name.to_string()));
                }
            } else if reference.name == PRELUDE_ALIAS && rest.starts_with('.') {
                edits.push((reference.start_byte, reference.end_byte + 1, String::new()));
            }
        }

        let count = edits.len();
        let mut reversed = body.to_string();
        edits.sort_by(|a, b| b.0.cmp(&a.0));
        for (start, end, replacement) in edits {
            reversed.replace_range(start..end, &replacement);
        }
        (reversed, count)
    }

    /// Fallback for files tree-sitter rejects
    fn strip_lines(&mut self, text: &str) -> StrippedFile {
        let mut stripped = StrippedFile {
            fallback: true,
            ..StrippedFile::default()
        };
        let mut body: Vec<&str> = Vec::new();
        let mut lines = text.lines();

        while let Some(line) = lines.next() {
            if !IMPORT_LINE.is_match(line) {
                body.push(line);
                continue;
            }
            let mut statement = line.to_string();
            let mut open = line.contains('(') && !line.contains(')');
            let mut continued = line.trim_end().ends_with('\\');
            while open || continued {
                let Some(next) = lines.next() else {
                    break;
                };
                statement.push('\n');
                statement.push_str(next);
                open = open && !next.contains(')');
                continued = next.trim_end().ends_with('\\');
            }
            match self.parser.parse(&statement) {
                Ok(index) => stripped.imports.extend(index.imports().cloned()),
                Err(_) => stripped.raw_imports.push(statement),
            }
        }

        let (body, reversed) = reverse_with_patterns(&trim_blank_edges(&body));
        stripped.body = body;
        stripped.reversed = reversed;
        stripped
    }
}

fn reverse_with_patterns(body: &str) -> (String, usize) {
    let count = DEFERRED_CALL.find_iter(body).count() + PRELUDE_ATTRIBUTE.find_iter(body).count();
    let body = DEFERRED_CALL.replace_all(body, "$1");
    let body = PRELUDE_ATTRIBUTE.replace_all(&body, "$1");
    (body.into_owned(), count)
}

fn trim_blank_edges(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(start, |i| i + 1);
    lines[start..end.max(start)].join("\n")
}

/// Tree-relative `.py` files, skipping packages, metadata, caches, and the output itself
fn discover(tree: &Path, output: &Path, report: &mut RunReport) -> Vec<String> {
    let output = std::fs::canonicalize(output).ok();
    let mut files = Vec::new();
    let walker = WalkDir::new(tree)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_dir() && (name == METADATA_DIR || name == "__pycache__"))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                report.warn(format!("Skipping unreadable entry: {err}"));
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some("py")
            || entry.file_name() == "__init__.py"
        {
            continue;
        }
        if output.is_some() && std::fs::canonicalize(path).ok() == output {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(tree) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
    files.sort();
    files
}

fn metadata_applies(record: &MetadataRecord, texts: &BTreeMap<String, String>) -> bool {
    record.module_mapping.values().any(|file| texts.contains_key(file))
}

fn metadata_order(record: &MetadataRecord, texts: &BTreeMap<String, String>) -> Vec<String> {
    let prelude = format!("{PRELUDE_STEM}.py");
    let init = format!("{INIT_STEM}.py");
    let entry = record
        .entry_file
        .clone()
        .unwrap_or_else(|| format!("{}.py", record.source_name));
    let special = [prelude.as_str(), init.as_str(), entry.as_str()];

    let mut mapped: Vec<(usize, &String)> = Vec::new();
    let mut unmapped: Vec<&String> = Vec::new();
    for file in texts.keys() {
        if special.contains(&file.as_str()) {
            continue;
        }
        match record.first_position(file) {
            Some(position) => mapped.push((position, file)),
            None => unmapped.push(file),
        }
    }
    mapped.sort();

    let mut order = Vec::new();
    if texts.contains_key(&prelude) {
        order.push(prelude.clone());
    }
    order.extend(mapped.into_iter().map(|(_, file)| file.clone()));
    order.extend(unmapped.into_iter().cloned());
    for file in [init, entry] {
        if texts.contains_key(&file) && !order.contains(&file) {
            order.push(file);
        }
    }
    order
}

fn default_order(tree: &Path, texts: &BTreeMap<String, String>) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for file in LEADING_FILES {
        if texts.contains_key(file) {
            order.push(file.to_string());
        }
    }

    let mut by_dir: BTreeMap<&str, Vec<&String>> = BTreeMap::new();
    let mut root_files: Vec<&String> = Vec::new();
    for file in texts.keys() {
        match file.split_once('/') {
            Some((dir, _)) => by_dir.entry(dir).or_default().push(file),
            None => root_files.push(file),
        }
    }

    for category in CATEGORY_PRIORITY {
        if let Some(files) = by_dir.remove(category) {
            order.extend(ordered_directory(tree, category, files));
        }
    }
    for (dir, files) in by_dir {
        order.extend(ordered_directory(tree, dir, files));
    }

    let init = format!("{INIT_STEM}.py");
    let mut guards = Vec::new();
    for file in root_files {
        if order.contains(file) || *file == init {
            continue;
        }
        if ENTRY_GUARD_LINE.is_match(&texts[file]) {
            guards.push(file.clone());
        } else {
            order.push(file.clone());
        }
    }
    if texts.contains_key(&init) {
        order.push(init);
    }
    order.extend(guards);
    order
}

/// Files of one directory, by its `__init__.py` unit order and then by path
fn ordered_directory(tree: &Path, dir: &str, mut files: Vec<&String>) -> Vec<String> {
    let stems = std::fs::read_to_string(tree.join(dir).join("__init__.py"))
        .map(|text| unit_order_comment(&text))
        .unwrap_or_default();
    let rank: HashMap<&str, usize> = stems
        .iter()
        .enumerate()
        .map(|(i, stem)| (stem.as_str(), i))
        .collect();

    files.sort_by_key(|file| {
        let stem = Path::new(file.as_str())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (rank.get(stem.as_str()).copied().unwrap_or(usize::MAX), (*file).clone())
    });
    files.into_iter().cloned().collect()
}

/// Stems listed in a `# unit order:` comment
fn unit_order_comment(text: &str) -> Vec<String> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(UNIT_ORDER_PREFIX))
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|stem| !stem.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Module roots that name files or directories of the tree itself
fn internal_roots(texts: &BTreeMap<String, String>) -> HashSet<String> {
    texts
        .keys()
        .map(|file| {
            let root = file.split('/').next().unwrap_or(file);
            root.strip_suffix(".py").unwrap_or(root).to_string()
        })
        .collect()
}

fn is_internal(decl: &ImportDecl, internal: &HashSet<String>) -> bool {
    decl.kind != ImportKind::Future && (decl.is_relative() || internal.contains(decl.root_module()))
}

fn assemble(
    tree_name: &str,
    decls: &[ImportDecl],
    raw_imports: &[String],
    bodies: &[(String, String)],
    banner_width: usize,
) -> String {
    let mut seen = HashSet::new();
    let unique: Vec<&ImportDecl> = decls.iter().filter(|d| seen.insert(d.render())).collect();

    let mut futures = Vec::new();
    let mut familiar = Vec::new();
    let mut other = Vec::new();
    for decl in unique {
        let tier = if decl.kind == ImportKind::Future {
            &mut futures
        } else if !decl.is_relative() && FAMILIAR_MODULES.contains(&decl.root_module()) {
            &mut familiar
        } else {
            &mut other
        };
        tier.push(decl.clone());
    }

    let mut sections = vec![format!(
        "#!/usr/bin/env python3\n# -*- coding: utf-8 -*-\n# Recomposed by unitsplit from {tree_name}"
    )];
    for tier in [&futures, &familiar, &other] {
        if !tier.is_empty() {
            sections.push(render_imports(tier).join("\n"));
        }
    }
    if !raw_imports.is_empty() {
        sections.push(raw_imports.join("\n"));
    }

    let rule = format!("# {}", "=".repeat(banner_width.saturating_sub(2)));
    let mut document = sections.join("\n\n");
    for (file, body) in bodies {
        document.push_str(&format!("\n\n\n{rule}\n# {file}\n{rule}\n{body}"));
    }
    document.push('\n');
    document
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Re-read the written file and confirm its length, digest, and directory entry
fn verify_written(path: &Path, expected_len: usize, expected_digest: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    match std::fs::read(path) {
        Ok(bytes) => {
            if bytes.len() != expected_len {
                warnings.push(format!(
                    "Integrity: {} has {} bytes, expected {expected_len}",
                    path.display(),
                    bytes.len()
                ));
            }
            if digest(&bytes) != expected_digest {
                warnings.push(format!("Integrity: {} digest mismatch", path.display()));
            }
        }
        Err(err) => warnings.push(format!("Integrity: cannot re-read {}: {err}", path.display())),
    }

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let listed = std::fs::read_dir(parent).is_ok_and(|entries| {
        entries
            .filter_map(std::result::Result::ok)
            .any(|entry| Some(entry.file_name().as_os_str()) == path.file_name())
    });
    if !listed {
        warnings.push(format!(
            "Integrity: {} not listed in {}",
            path.display(),
            parent.display()
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(files: &[(&str, &str)]) -> BTreeMap<String, String> {
        files
            .iter()
            .map(|(file, text)| (file.to_string(), text.to_string()))
            .collect()
    }

    #[test]
    fn test_unit_order_comment() {
        let text = "# <unitsplit:scaffold>\n# unit order: Base, Derived\nfrom core.Base import Base\n";
        assert_eq!(unit_order_comment(text), vec!["Base", "Derived"]);
        assert!(unit_order_comment("x = 1\n").is_empty());
    }

    #[test]
    fn test_default_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("core")).unwrap();
        std::fs::write(
            dir.path().join("core/__init__.py"),
            "# unit order: Zeta, Alpha\n",
        )
        .unwrap();

        let texts = texts(&[
            ("app.py", "if __name__ == '__main__':\n    main()\n"),
            ("config.py", "DEBUG = True\n"),
            ("core/Alpha.py", "class Alpha: pass\n"),
            ("core/Zeta.py", "class Zeta: pass\n"),
            ("extra/tool.py", "def tool(): pass\n"),
            ("gui/Main.py", "class Main: pass\n"),
            ("helpers.py", "def h(): pass\n"),
            ("imports.py", "import os\n"),
            ("init.py", "x = 1\n"),
            ("utils/utils.py", "def f(): pass\n"),
        ]);

        assert_eq!(
            default_order(dir.path(), &texts),
            vec![
                "imports.py",
                "config.py",
                "utils/utils.py",
                "core/Zeta.py",
                "core/Alpha.py",
                "gui/Main.py",
                "extra/tool.py",
                "helpers.py",
                "init.py",
                "app.py",
            ]
        );
    }

    #[test]
    fn test_reverse_with_patterns() {
        let (body, count) = reverse_with_patterns(
            "def f():\n    _prelude.COUNTER += 1\n    return _deferred_A()(1)\n",
        );
        assert_eq!(body, "def f():\n    COUNTER += 1\n    return A(1)\n");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_internal_imports_are_dropped() {
        let texts = texts(&[("core/Base.py", ""), ("imports.py", "")]);
        let internal = internal_roots(&texts);
        assert!(is_internal(&ImportDecl::from_module("core.Base", "Base", None, 1), &internal));
        assert!(is_internal(&ImportDecl::from_module("imports", "*", None, 1), &internal));
        assert!(is_internal(&ImportDecl::from_module(".sibling", "x", None, 1), &internal));
        assert!(!is_internal(&ImportDecl::plain("os", None, 1), &internal));
    }

    #[test]
    fn test_assemble_tiers_and_banners() {
        let decls = vec![
            ImportDecl::plain("requests", None, 1),
            ImportDecl::plain("os", None, 2),
            ImportDecl::future("annotations", 1),
            ImportDecl::plain("os", None, 9),
            ImportDecl::from_module("typing", "List", None, 3),
        ];
        let bodies = vec![("core/Base.py".to_string(), "class Base:\n    pass".to_string())];
        let text = assemble("modules", &decls, &[], &bodies, 20);

        assert_eq!(
            text,
            "#!/usr/bin/env python3\n# -*- coding: utf-8 -*-\n# Recomposed by unitsplit from modules\n\n\
             from __future__ import annotations\n\n\
             import os\nfrom typing import List\n\n\
             import requests\n\n\n\
             # ==================\n# core/Base.py\n# ==================\nclass Base:\n    pass\n"
        );
    }

    #[test]
    fn test_verify_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.py");
        std::fs::write(&path, "x = 1\n").unwrap();

        assert!(verify_written(&path, 6, &digest(b"x = 1\n")).is_empty());
        assert_eq!(verify_written(&path, 7, &digest(b"x = 2\n")).len(), 2);
        assert_eq!(verify_written(&dir.path().join("missing.py"), 1, "0").len(), 2);
    }
}
