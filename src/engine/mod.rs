//! Core engine: odds extraction, the concurrent odds batch, the run
//! pipeline and the downstream bet executor.

pub mod executor;
pub mod odds;
pub mod pipeline;
pub mod scheduler;
