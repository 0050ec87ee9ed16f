//! Backend gateway access: envelope normalization, wire models, and the
//! HTTP client with its typed operations.

pub mod client;
pub mod envelope;
pub mod models;

pub use client::ApiClient;
pub use envelope::{EnvelopeKind, Normalized};
