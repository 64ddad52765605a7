//! Raid alert relay service: bridges Rust+ device events and server status to
//! a Discord channel.

pub mod config;
pub mod discord;
pub mod formatters;
pub mod liveness;
pub mod relay;
