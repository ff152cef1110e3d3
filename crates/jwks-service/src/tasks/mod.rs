//! Background tasks for the JWKS service.
//!
//! - `key_rotation`: registers a fresh signing key before the newest one
//!   expires and optionally purges long-expired keys.

pub mod key_rotation;

pub use key_rotation::{start_key_rotation, KeyRotationConfig};
