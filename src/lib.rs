//! Warehouse Coder: retrieval-augmented code generation for cloud data warehouses
//!
//! Decomposes a natural-language idea into an ordered plan, generates SQL or
//! procedural code for each step from retrieved documentation, executes it
//! against a warehouse session and repairs failures with a bounded retry loop.

pub mod cli;
pub mod codegen;
pub mod completion;
pub mod config;
pub mod documentation;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod plan;
pub mod prompt;
pub mod repair;
pub mod research;
pub mod retrieval;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod testing;
