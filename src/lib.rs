//! subflow - batch subtitle translation with sessions, jobs and a JSON-RPC surface
//!
//! Subtitle text is split into numbered replicas, grouped into batches and sent
//! to a translation oracle one batch at a time, with retry, progress reporting
//! and cancellation. Jobs and the sessions that own them live in an explicit
//! [`store::Store`] that a background sweeper keeps bounded.

pub mod cli;
pub mod config;
pub mod error;
pub mod subtitle;
pub mod batch;
pub mod progress;
pub mod translate;
pub mod pipeline;
pub mod store;
pub mod media;
pub mod rpc;
