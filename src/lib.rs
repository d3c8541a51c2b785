//! Mediabuf - Media source buffering front end
//!
//! This library crate exposes the demuxer front, settings loading and the
//! session replay used by the `mediabuf` binary, for integration testing.

pub mod config;
pub mod demuxer;
pub mod script;
