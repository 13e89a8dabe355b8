//! Backends module - Query engine integration and file operations
//!
//! Provides:
//! - scan: YAML manifest discovery with the ignore walker
//! - query: Engine query expression builder
//! - engine: Subprocess execution with timeout and cancellation
//! - parse: Engine output to records
//! - aggregate: Concurrent per-file queries
//! - doctor: Dependency checking

pub mod aggregate;
pub mod doctor;
pub mod engine;
pub mod parse;
pub mod query;
pub mod scan;
