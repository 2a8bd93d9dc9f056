//! Sceneclip - cut a time window out of a media file and re-encode it
//!
//! This library crate exposes the binary's configuration and diagnostics for
//! integration testing.

pub mod config;
pub mod report;
