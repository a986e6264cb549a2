//! Client and job lifecycle for the remote video generation service.
//!
//! Provides a timeout-bounded [`transport`], the REST wrapper in
//! [`api`], submission with an optional simulated fallback, a
//! cancellable status poller, and the [`controller::JobController`]
//! that ties them together behind `submit` / `refresh` / `cancel`.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod messages;
pub mod poller;
pub mod source;
pub mod store;
pub mod submitter;
pub mod transport;
