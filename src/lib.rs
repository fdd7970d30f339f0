//! Bulk property-graph loading via direct table writes.
//!
//! The `graph` module is the embedded store (tables, catalog, counters, the
//! native per-entity create path and the bulk-load entry point); `loader`
//! implements the staged direct path on top of it: bulk transfer into a
//! holding area, set-based conflict and integrity filtering, and identifier
//! assignment scoped to the rows that actually insert.

pub mod cli;
pub mod commands;
pub mod error;
pub mod graph;
pub mod ident;
pub mod loader;
pub mod model;
pub mod util;
