use serde::{Deserialize, Serialize};

/// Category used when no rule matches a type name
pub const DEFAULT_CATEGORY: &str = "core";

/// Directory holding every function bucket
pub const UTILS_CATEGORY: &str = "utils";

/// Function that the entry file imports and calls
pub const ENTRY_FUNCTION: &str = "main";

/// Fixed category priority for recomposition without metadata
pub const CATEGORY_PRIORITY: [&str; 8] = [
    "utils",
    "core",
    "models",
    "handlers",
    "managers",
    "analyzers",
    "loggers",
    "gui",
];

/// One `(predicate, category)` pair; the predicate is a substring test on the lower-cased name
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub needles: &'static [&'static str],
    pub category: &'static str,
}

impl CategoryRule {
    #[must_use]
    pub fn matches(&self, lowered: &str) -> bool {
        self.needles.iter().any(|needle| lowered.contains(needle))
    }
}

/// Evaluated top to bottom, first match wins
pub const TYPE_RULES: [CategoryRule; 6] = [
    CategoryRule {
        needles: &["handler"],
        category: "handlers",
    },
    CategoryRule {
        needles: &["manager", "monitor"],
        category: "managers",
    },
    CategoryRule {
        needles: &["gui", "window", "dialog"],
        category: "gui",
    },
    CategoryRule {
        needles: &["analyzer", "checker"],
        category: "analyzers",
    },
    CategoryRule {
        needles: &["logger", "log"],
        category: "loggers",
    },
    CategoryRule {
        needles: &["model"],
        category: "models",
    },
];

/// Category directory for a type definition
#[must_use]
pub fn type_category(name: &str) -> &'static str {
    let lowered = name.to_lowercase();
    TYPE_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map_or(DEFAULT_CATEGORY, |rule| rule.category)
}

/// Purpose bucket of a free function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunctionBucket {
    Main,
    Runner,
    Cleanup,
    Utils,
}

impl FunctionBucket {
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        if name == ENTRY_FUNCTION {
            Self::Main
        } else if name.starts_with("run_") {
            Self::Runner
        } else if name.starts_with("cleanup_") {
            Self::Cleanup
        } else {
            Self::Utils
        }
    }

    pub const fn file_stem(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Runner => "runner_functions",
            Self::Cleanup => "cleanup",
            Self::Utils => "utils",
        }
    }
}
