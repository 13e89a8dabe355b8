//! Flows module - Operations combining scan, engine and result model
//!
//! Provides:
//! - evaluate: Condition evaluation into deduplicated `latest` incidents

pub mod evaluate;
