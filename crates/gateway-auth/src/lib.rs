//! Gateway Auth Service Library
//!
//! Issues and refreshes signed access tokens for the API gateway. Access
//! tokens are EdDSA-signed JWTs; refresh tokens are opaque identifiers kept
//! in a rotating server-side store (one active token per user and audience).
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Token signing/verification and refresh cookie sealing
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Data models
//! - `observability` - Log field hashing and metrics
//! - `repositories` - Database access layer
//! - `routes` - Router construction
//! - `services` - Token lifecycle (store, validator, token service, verifier)

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
