use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory under the tree root holding the metadata record
pub const METADATA_DIR: &str = ".metadata";

/// File name of the metadata record
pub const METADATA_FILE: &str = "metadata.json";

/// A reference that goes through a deferred accessor
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeferredReference {
    pub from: String,
    pub to: String,
    pub module: String,
}

/// Per-unit summary keyed by unit name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    pub kind: String,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub dependencies: usize,
    pub dependents: usize,
}

/// Persisted description of one decomposition, consumed by recomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub source_file: String,
    pub source_name: String,
    pub target_dir: String,

    /// Every named unit in source order
    pub class_order: Vec<String>,

    /// Unit name → tree-relative file
    pub module_mapping: BTreeMap<String, String>,

    pub total_classes: usize,
    pub total_functions: usize,
    pub total_imports: usize,
    pub total_constants: usize,

    /// Bindings evaluated in `init.py`
    #[serde(default)]
    pub global_init: Vec<String>,

    #[serde(default)]
    pub category_order: Vec<String>,

    /// Category → files in load order
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_file: Option<String>,

    #[serde(default)]
    pub cycles: Vec<Vec<String>>,

    #[serde(default)]
    pub deferred_references: Vec<DeferredReference>,

    /// Every file created by this decomposition
    #[serde(default)]
    pub artifacts: Vec<String>,

    #[serde(default)]
    pub unit_stats: BTreeMap<String, UnitStats>,

    #[serde(default)]
    pub generator: String,
}

impl MetadataRecord {
    /// Location of the record inside a bucket tree
    #[must_use]
    pub fn path_for_tree(tree_root: &Path) -> PathBuf {
        tree_root.join(METADATA_DIR).join(METADATA_FILE)
    }

    /// Persist through a temporary file and rename
    pub fn write(&self, tree_root: &Path) -> Result<PathBuf> {
        let path = Self::path_for_tree(tree_root);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| EngineError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| EngineError::io(&path, e))?;
        Ok(path)
    }

    /// Read the record of a tree; `None` when the tree has none
    pub fn read(tree_root: &Path) -> Result<Option<Self>> {
        let path = Self::path_for_tree(tree_root);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(EngineError::io(&path, err)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Smallest source-order position among the units mapped to `file`
    #[must_use]
    pub fn first_position(&self, file: &str) -> Option<usize> {
        self.class_order
            .iter()
            .position(|name| self.module_mapping.get(name).is_some_and(|f| f == file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> MetadataRecord {
        MetadataRecord {
            source_file: "/tmp/app.py".to_string(),
            source_name: "app".to_string(),
            target_dir: "/tmp/modules".to_string(),
            class_order: vec!["LIMIT".to_string(), "Base".to_string(), "helper".to_string()],
            module_mapping: BTreeMap::from([
                ("LIMIT".to_string(), "imports.py".to_string()),
                ("Base".to_string(), "core/Base.py".to_string()),
                ("helper".to_string(), "utils/utils.py".to_string()),
            ]),
            total_classes: 1,
            total_functions: 1,
            total_imports: 0,
            total_constants: 1,
            global_init: Vec::new(),
            category_order: vec!["core".to_string(), "utils".to_string()],
            categories: BTreeMap::new(),
            entry_file: None,
            cycles: Vec::new(),
            deferred_references: Vec::new(),
            artifacts: Vec::new(),
            unit_stats: BTreeMap::new(),
            generator: "test".to_string(),
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let original = record();

        let path = original.write(dir.path()).unwrap();
        assert!(path.ends_with(".metadata/metadata.json"));
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = MetadataRecord::read(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MetadataRecord::read(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_malformed_record_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = MetadataRecord::path_for_tree(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            MetadataRecord::read(dir.path()),
            Err(EngineError::Metadata(_))
        ));
    }

    #[test]
    fn test_first_position() {
        let record = record();
        assert_eq!(record.first_position("core/Base.py"), Some(1));
        assert_eq!(record.first_position("utils/utils.py"), Some(2));
        assert_eq!(record.first_position("gui/Main.py"), None);
    }
}
