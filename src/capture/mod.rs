//! Streaming capture client
//!
//! Talks to the local capture process over loopback TCP and retrieves
//! batches of raw baseband records.

mod client;

pub use client::{CaptureClient, ClientState, MAX_FRAME_BYTES};
