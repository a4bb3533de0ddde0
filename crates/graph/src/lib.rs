//! # Unitsplit Graph
//!
//! Dependency analysis between the top-level units of one document.
//!
//! ## Features
//!
//! - **Dependency tracking** - supertypes and free references between definitions
//! - **Cycle detection** - back-edges on the active DFS path
//! - **Load order** - dependencies first, source order inside cyclic groups
//! - **Reachability** - `would_create_cycle` for deciding deferred references
//!
//! ## Architecture
//!
//! ```text
//! StructuralIndex
//!     │
//!     ├──> Dependency Resolver
//!     │      ├─ Nodes: types and free functions (source order)
//!     │      └─ Edges: Extends (supertypes), Uses (free references)
//!     │
//!     └──> Dependency Graph (petgraph)
//!            ├─ detect_cycles / mutual_groups
//!            ├─ load_order
//!            └─ would_create_cycle / dependents
//! ```
//!
//! The same graph type also serves file-level and category-level ordering.

mod builder;
mod error;
mod graph;
mod types;

pub use builder::DependencyResolver;
pub use error::{GraphError, Result};
pub use types::{DependencyGraph, RelationshipType};
