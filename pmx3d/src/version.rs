//! PMX format identification.

/// Magic bytes at the start of every PMX file (`"PMX "`).
pub const PMX_MAGIC: [u8; 4] = *b"PMX ";

/// Format version this decoder targets.
pub const PMX_TARGET_VERSION: f32 = 2.0;
