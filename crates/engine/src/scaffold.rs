//! Generated glue code and the markers that fence it.
//!
//! Everything the decomposer adds to a unit file sits inside a scaffold block,
//! so the recomposer can drop it without understanding it.

/// Opens a generated block
pub const SCAFFOLD_BEGIN: &str = "# <unitsplit:scaffold>";

/// Closes a generated block
pub const SCAFFOLD_END: &str = "# </unitsplit:scaffold>";

/// Prefix of cycle-breaking accessor functions
pub const DEFERRED_PREFIX: &str = "_deferred_";

/// Per-file cache used by deferred accessors
pub const DEFERRED_CACHE: &str = "_deferred_cache";

/// Module alias under which live bindings are reached
pub const PRELUDE_ALIAS: &str = "_prelude";

/// Comment in a category `__init__.py` listing its unit files in load order
pub const UNIT_ORDER_PREFIX: &str = "# unit order:";

/// Fence generated lines as one scaffold block
#[must_use]
pub fn wrap<S: AsRef<str>>(lines: &[S]) -> String {
    let mut block = String::from(SCAFFOLD_BEGIN);
    for line in lines {
        block.push('\n');
        block.push_str(line.as_ref());
    }
    block.push('\n');
    block.push_str(SCAFFOLD_END);
    block
}

/// Accessor that imports `name` from `module` on first call and caches it
#[must_use]
pub fn deferred_accessor(name: &str, module: &str) -> String {
    format!(
        "def {DEFERRED_PREFIX}{name}():\n    \
         if '{name}' not in {DEFERRED_CACHE}:\n        \
         from {module} import {name}\n        \
         {DEFERRED_CACHE}['{name}'] = {name}\n    \
         return {DEFERRED_CACHE}['{name}']"
    )
}

/// Placeholder keeping a live binding's name importable before init runs
#[must_use]
pub fn placeholder(name: &str) -> String {
    format!("{name} = None")
}

/// Write a deferred binding's value back into the prelude
#[must_use]
pub fn write_back(name: &str) -> String {
    format!("{PRELUDE_ALIAS}.{name} = {name}")
}

/// Remove every scaffold block, markers included.
///
/// An unterminated block runs to the end of the text. Returns the remaining
/// text and the number of blocks removed.
#[must_use]
pub fn strip_scaffold(text: &str) -> (String, usize) {
    let mut kept: Vec<&str> = Vec::new();
    let mut inside = false;
    let mut blocks = 0;

    for line in text.lines() {
        let marker = line.trim();
        if inside {
            if marker == SCAFFOLD_END {
                inside = false;
            }
            continue;
        }
        if marker == SCAFFOLD_BEGIN {
            inside = true;
            blocks += 1;
            continue;
        }
        kept.push(line);
    }

    if inside {
        log::warn!("Unterminated scaffold block; dropped the rest of the file");
    }

    let mut stripped = kept.join("\n");
    if text.ends_with('\n') && !stripped.is_empty() {
        stripped.push('\n');
    }
    (stripped, blocks)
}
