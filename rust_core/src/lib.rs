//! Raidbell Core - shared pieces of the raid alert relay.
//!
//! This crate provides:
//! - Device event and server status models
//! - The telemetry client interface and a Rust+ companion socket client
//! - The chat sink interface the relay sends through

pub mod chat;
pub mod models;
pub mod telemetry;

pub use models::{DeviceEvent, ServerStatus, TelemetryLink};
