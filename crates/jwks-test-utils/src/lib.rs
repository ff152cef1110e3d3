//! # JWKS Test Utilities
//!
//! Shared test utilities for the JWKS service.
//!
//! This crate provides:
//! - Cached RSA fixture keys (generation is too slow to repeat per test)
//! - Server test harness (TestJwksServer for E2E tests)
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jwks_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestJwksServer::spawn_bootstrapped().await?;
//!     let jwks = server.fetch_jwks().await?;
//!
//!     server
//!         .request_token(false)
//!         .await?
//!         .assert_valid_jwt()
//!         .assert_verifies_against(&jwks);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
