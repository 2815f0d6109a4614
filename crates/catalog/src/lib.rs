//! # Refactor Catalog
//!
//! Read-only access to the metadata of a relational database: routine source
//! text, column lists of tables/views and table-valued types, scalar type
//! definitions and the catalog's own dependency records.
//!
//! ## Architecture
//!
//! ```text
//! MetadataStore (trait)
//!     │
//!     ├──> SqlMetadataAccessor<C: QueryConnection>
//!     │      └─ parameterized queries against sys.* / INFORMATION_SCHEMA views
//!     │
//!     └──> CatalogSnapshot
//!            └─ offline JSON dump of the same information
//! ```
//!
//! Connection establishment is the caller's business: `SqlMetadataAccessor`
//! only needs something that can run a parameterized query and hand back rows.

mod error;
mod snapshot;
mod sql;
mod store;
mod types;

pub use error::{MetadataAccessError, Result};
pub use snapshot::{
    CatalogSnapshot, SnapshotDependency, SnapshotRelation, SnapshotRoutine, SnapshotScalarType,
    SnapshotTableType,
};
pub use sql::{QueryConnection, SqlMetadataAccessor, SqlRow, SqlValue};
pub use store::{CatalogDependency, MetadataStore};
pub use types::{ColumnInfo, ObjectKind, RoutineClass, RoutineRef, ScalarTypeInfo, DEFAULT_SCHEMA};
