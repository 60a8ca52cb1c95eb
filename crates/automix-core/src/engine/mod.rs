//! Mixing engine - the analyze/render orchestrator

mod mixer;

pub use mixer::*;
