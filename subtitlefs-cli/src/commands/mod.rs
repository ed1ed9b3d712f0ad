//! CLI command implementations.
//!
//! - [`mount`] - Mount the overlay (main command)
//! - [`scan`] - One background-style extraction pass without mounting
//! - [`cache`] - Cache maintenance (prune, clear)
//! - [`tracks`] - List a video's tracks

pub mod cache;
pub mod common;
pub mod mount;
pub mod scan;
pub mod tracks;
