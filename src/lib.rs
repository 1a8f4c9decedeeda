//! Distributed monotonic-clock synchronization.
//!
//! A [`Client`] estimates a remote reference clock's current time and a
//! drift-adjusted rate by exchanging small UDP probes with a [`Server`],
//! maintaining a bounded history of round trips and filtering outliers via
//! a median round-trip test. A [`Server`] is a stateless echo: it stamps
//! its own monotonic clock into each reply it sends back.

pub mod client;
pub mod error;
pub mod estimator;
pub mod platform;
pub mod ring;
pub mod server;
pub mod settings;
pub mod stats;
pub mod wire;

pub use client::Client;
pub use error::{CreateError, ParseError};
pub use server::Server;
pub use settings::Settings;
pub use stats::{AccuracySummary, Statistics};
