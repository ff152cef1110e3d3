//! JWKS Key Service Library
//!
//! Issues RS256 signing keys, publishes the valid ones as a JSON Web Key
//! Set and signs bearer tokens, including deliberately expired ones for
//! exercising verifier rejection paths.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - RSA keys, JWT signing and verification, at-rest sealing
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Data models
//! - `observability` - Metrics and error categories
//! - `repositories` - Key storage (memory, SQLite)
//! - `routes` - Router and layers
//! - `services` - Key lifecycle and token issuance
//! - `tasks` - Background key rotation

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
