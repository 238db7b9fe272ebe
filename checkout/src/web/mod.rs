// gok_checkout/src/web/mod.rs

//! Transport-agnostic request handlers. Each takes the shared `AppState` and a
//! request payload and answers with an `ApiResponse` envelope; wiring them to
//! an HTTP router is left to the embedding service.

pub mod envelope;
pub mod handlers;

pub use envelope::ApiResponse;
