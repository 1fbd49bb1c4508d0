//! Background worker that drains the bulk job queue.
//!
//! The [`Dispatcher`](dispatcher::Dispatcher) claims one pending bulk job at
//! a time, resolves its handler in the [`HandlerRegistry`](registry::HandlerRegistry),
//! and runs it with a [`JobContext`](context::JobContext). Handlers enrich
//! leads through the bounded [`EnrichmentRunner`](runner::EnrichmentRunner).

pub mod clients;
pub mod config;
pub mod context;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod runner;
pub mod store;
