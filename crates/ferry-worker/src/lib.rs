//! Ferry Worker Library
//!
//! The transfer orchestrator: resolves configured backends into live
//! instances, drives the per-file transfer protocol, and runs one of the
//! three orchestration modes (batch-poll, publish-only, consume-loop).

pub mod orchestrator;

pub use orchestrator::Orchestrator;
