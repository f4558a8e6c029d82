//! HTTP API for the daemon.
//!
//! Handlers are thin: they translate requests into calls on the store, the
//! scheduler and the session handle, and map component errors to status
//! codes.

mod server;
mod v0;

pub use server::{ApiError, SharedState, router, serve};
