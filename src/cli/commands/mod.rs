//! CLI command handlers

pub mod infer;
pub mod run;
