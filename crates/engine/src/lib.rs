//! # Unitsplit Engine
//!
//! Splits one Python document into a tree of importable unit files and joins
//! such a tree back into one document.
//!
//! ## Decomposition
//!
//! ```text
//! StructuralIndex + DependencyGraph
//!     │
//!     ├──> plan      → BucketPlan     (unit → category file)
//!     ├──> classify  → BindingPlan    (prelude / init / entry placement)
//!     ├──> layout    → TreeLayout     (file and category order)
//!     ├──> rewrite   → RewrittenUnit  (direct imports, deferred accessors, live names)
//!     ├──> render    → Artifact       (imports.py, unit files, __init__.py, init.py, entry)
//!     └──> write     → bucket tree + .metadata/metadata.json
//! ```
//!
//! ## Recomposition
//!
//! ```text
//! bucket tree
//!     │
//!     ├──> discover (walkdir) → order (metadata or category priority)
//!     ├──> strip scaffold, collect imports, reverse generated names
//!     ├──> tiered imports + bannered bodies → cleanup
//!     └──> write + integrity check
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use unitsplit_engine::{decompose, recompose, CleanupOptions};
//!
//! assert!(decompose("app.py", "modules"));
//! assert!(recompose("modules", "app_built.py", &CleanupOptions::default()));
//! ```

mod category;
mod classify;
mod cleanup;
mod config;
mod decompose;
mod error;
mod layout;
mod metadata;
mod plan;
mod recompose;
mod render;
mod report;
mod rewrite;
mod scaffold;
mod writer;

pub use category::{
    type_category, CategoryRule, FunctionBucket, CATEGORY_PRIORITY, DEFAULT_CATEGORY,
    ENTRY_FUNCTION, TYPE_RULES, UTILS_CATEGORY,
};
pub use classify::{BindingPlan, Placement};
pub use cleanup::{apply_cleanup, apply_cleanup_preserving};
pub use config::{CleanupOptions, RecomposeConfig};
pub use decompose::{BucketTree, Decomposer};
pub use error::{EngineError, Result};
pub use layout::TreeLayout;
pub use metadata::{DeferredReference, MetadataRecord, UnitStats, METADATA_DIR, METADATA_FILE};
pub use plan::{Bucket, BucketPlan};
pub use recompose::{Document, OrderSource, Recomposer};
pub use render::{entry_stem, Artifact, ArtifactKind, RenderInput, INIT_STEM, PRELUDE_STEM};
pub use report::{FailedArtifact, RunReport, StageTrace};
pub use rewrite::{pinned_local_imports, DeferredTarget, Host, RewriteContext, RewrittenUnit};
pub use scaffold::{strip_scaffold, DEFERRED_PREFIX, PRELUDE_ALIAS, SCAFFOLD_BEGIN, SCAFFOLD_END};

use std::path::Path;

/// Decompose `source_path` into a bucket tree under `destination_dir`.
///
/// Returns `false` on any failure; the log holds the stage trace.
pub fn decompose(source_path: impl AsRef<Path>, destination_dir: impl AsRef<Path>) -> bool {
    let report = match Decomposer::new() {
        Ok(mut decomposer) => decomposer.run(source_path.as_ref(), destination_dir.as_ref()),
        Err(err) => {
            log::error!("Failed to initialize decomposer: {err}");
            return false;
        }
    };
    log::info!("{}", report.summary());
    report.success
}

/// Recompose the bucket tree at `tree_dir` into `output_file`
pub fn recompose(
    tree_dir: impl AsRef<Path>,
    output_file: impl AsRef<Path>,
    cleanup: &CleanupOptions,
) -> bool {
    let config = RecomposeConfig {
        cleanup: cleanup.clone(),
        ..RecomposeConfig::default()
    };
    let report = match Recomposer::new(config) {
        Ok(mut recomposer) => recomposer.run(tree_dir.as_ref(), output_file.as_ref()),
        Err(err) => {
            log::error!("Failed to initialize recomposer: {err}");
            return false;
        }
    };
    log::info!("{}", report.summary());
    report.success
}
