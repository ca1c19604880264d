//! Shared types and models for the Manufacturing Order Workflow
//!
//! This crate holds the pure workflow rules (stage catalog, gating, status
//! aggregation, document synthesis) shared between the backend and the
//! browser module built from the `wasm` crate.

pub mod checklists;
pub mod gate;
pub mod models;
pub mod report;
pub mod validation;
pub mod workflow;

pub use checklists::*;
pub use gate::*;
pub use models::*;
pub use report::*;
pub use validation::*;
pub use workflow::*;
