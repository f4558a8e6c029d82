//! Wake-up alarm that only stops when an enrolled QR code is scanned.
//!
//! The daemon keeps one alarm record in a [`store::ConfigStore`], turns a
//! wake time into a single pending wake-up with the [`scheduler`], and
//! rings through the [`session`] actor until the enrolled code is scanned,
//! the alarm is stopped, or the auto-stop deadline passes.

pub mod api;
pub mod api_client;
pub mod clock;
pub mod config;
pub mod error;
pub mod platform;
pub mod scheduler;
pub mod secret;
pub mod session;
pub mod store;
pub mod tracing;

#[cfg(test)]
mod testing;
