//! Domain types and pure logic for video generation jobs.
//!
//! Nothing in this crate performs I/O. Network access, timers and the
//! job lifecycle orchestration live in `vidgen-inference`.

pub mod error;
pub mod hashing;
pub mod job;
pub mod request;
pub mod simulation;
pub mod state;
pub mod types;
