//! # Unitsplit Source Parser
//!
//! Exact-boundary extraction of top-level Python units for decomposition.
//!
//! ## Philosophy
//!
//! The syntax tree is the single source of truth:
//! - Boundaries come from tree-sitter spans, never from indentation guesses
//! - Only direct children of the module are units; nested definitions stay inside their parent
//! - Every significant top-level line belongs to exactly one unit, and this is checked
//!
//! ## Architecture
//!
//! ```text
//! Python document
//!     │
//!     ├──> Normalize (BOM, CRLF)
//!     │
//!     ├──> Tree-sitter parse → StructuralError on ERROR/MISSING nodes
//!     │
//!     ├──> Top-level classification
//!     │    ├─> TypeDefinition / FreeFunction (decorators included)
//!     │    ├─> Binding (single identifier target)
//!     │    ├─> Import (one ImportDecl per name)
//!     │    └─> Statement (plain, conditional import, entry guard)
//!     │
//!     ├──> Body analysis (each unit re-parsed alone)
//!     │    └─> Scope-aware free references → usedNames
//!     │
//!     └──> Coverage assertion → StructuralIndex
//! ```
//!
//! ## Example
//!
//! ```rust
//! use unitsplit_source_parser::{SourceParser, UnitKind};
//!
//! let mut parser = SourceParser::new().unwrap();
//! let index = parser
//!     .parse("class Base:\n    pass\n\nclass Derived(Base):\n    pass\n")
//!     .unwrap();
//!
//! let derived = index.find_definition("Derived").unwrap();
//! assert_eq!(derived.kind, UnitKind::TypeDefinition);
//! assert_eq!(derived.base_refs, vec!["Base".to_string()]);
//! assert_eq!((derived.span.start, derived.span.end), (4, 5));
//! ```

mod analyzer;
mod coverage;
mod error;
mod imports;
mod references;
mod types;

pub use analyzer::{normalize_source, SourceParser};
pub use coverage::{check_coverage, is_significant};
pub use error::{ParserError, Result};
pub use imports::{render_imports, ImportDecl, ImportKind};
pub use references::{BodyAnalysis, LocalImport, Reference};
pub use types::{LineSpan, SourceUnit, StatementRole, StructuralIndex, UnitKind};
