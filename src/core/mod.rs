//! Core modules for archgate's graph, validation and correction governance.
//!
//! Everything the CLI and the validators build on lives here: the contract,
//! path classification, import resolution, the graph builder, the validator
//! union, the failure classifier and the correction policy engine.

pub mod contract;
pub mod correction;
pub mod error;
pub mod failure;
pub mod graph;
pub mod layers;
pub mod output;
pub mod resolve;
pub mod signals;
pub mod trace;
pub mod validate;
pub mod violation;
