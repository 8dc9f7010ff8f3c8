//! Integration Tests Module
//!
//! End-to-end coverage of conversation turns, remote tools and the HTTP
//! surface, all against an in-memory database and a scripted provider.

mod common;

// Turn orchestration: streaming, tool loop, branching, failures
mod orchestrator_test;
