//! raceodds: race discovery and odds collection for regional racing.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod collab;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod http;
pub mod sources;
pub mod storage;
pub mod tracks;
pub mod types;
