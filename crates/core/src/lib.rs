//! Wayfinder Core - shared infrastructure
//!
//! This crate carries the error types every other Wayfinder crate leans on:
//! the parsing front end's error enum and the umbrella error/`Result` alias.
//! Construction diagnostics are emitted through `tracing` macros at their
//! call sites; installing a subscriber is the embedding tool's job.

pub mod errors;

pub use errors::*;
