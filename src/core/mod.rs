//! Core module - Contains the fundamental data structures and utilities
//!
//! This module provides:
//! - Unified result model (ResultItem) and the incident types
//! - Error types for the engine, scanner and provider
//! - Rendering functions for different output formats
//! - Logging setup
//! - Path normalization and file URIs

pub mod error;
pub mod logging;
pub mod model;
pub mod paths;
pub mod render;
pub mod util;
