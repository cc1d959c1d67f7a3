//! Pure Rust decoder for PMX, the binary model format used by MikuMikuDance.
//!
//! The decoder is IO-free: it operates on an in-memory byte slice in a single
//! forward-only pass and produces an owned [`Model`]. This crate is
//! renderer-agnostic; scene-script emission for the companion JS engine lives
//! in a separate crate (`pmx3d-scene`).

#![forbid(unsafe_code)]

mod binary;
mod encoding;
mod error;
mod model;
mod version;

pub use binary::*;
pub use error::*;
pub use model::*;
pub use version::*;
