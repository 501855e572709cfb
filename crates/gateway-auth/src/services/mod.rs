pub mod credential_verifier;
pub mod refresh_token_store;
pub mod refresh_token_validator;
pub mod token_service;
