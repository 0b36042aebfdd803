//! Data-driven content for alembic processing units.
//!
//! Reads resources, items, recipes, containers and machine/host settings
//! from RON, JSON or TOML files in a content directory, resolves names into
//! ids, and freezes the result into a shared [`Registry`](alembic_core::registry::Registry).

pub mod content;
pub mod loader;
pub mod schema;

pub use content::{Content, load_content};
pub use loader::DataLoadError;
