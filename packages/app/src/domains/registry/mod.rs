//! Fire-safety registry - organizations, buildings, extinguishers and work logs.
//!
//! All records live in the external document store; the [`Registry`] trait
//! defines the operations and [`DocumentRegistry`] implements them over
//! [`BaseDocumentStore`](crate::kernel::BaseDocumentStore). List queries are
//! exposed as live snapshot streams.

pub mod models;
pub mod repository;

pub use repository::{DocumentRegistry, Registry, Snapshots};
