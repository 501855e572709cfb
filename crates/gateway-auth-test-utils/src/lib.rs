//! # Gateway Auth Test Utilities
//!
//! Shared test utilities for the gateway auth service:
//! - Deterministic crypto fixtures (fixed signing and cookie keys)
//! - Credential verifiers and Postgres user seeding
//! - Fault-injecting refresh token store
//! - Server test harness (`TestAuthServer` for E2E tests)
//! - Custom assertions (`TokenAssertions` trait, cookie helpers)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestAuthServer::spawn().await?;
//!     let pair = server.token_service().issue_for_user(TEST_USERNAME).await?;
//!
//!     pair.access_token
//!         .assert_valid_jwt()
//!         .assert_for_user(TEST_USERNAME);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod credential_fixtures;
pub mod crypto_fixtures;
pub mod fault_injection;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use credential_fixtures::*;
pub use crypto_fixtures::*;
pub use fault_injection::*;
pub use server_harness::*;
