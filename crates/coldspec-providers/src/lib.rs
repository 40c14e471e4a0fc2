//! Clients for the external providers (embedding, generation, PDF text
//! extraction), plus the retry policy they share and deterministic mocks
//! for tests.

pub mod http;
pub mod mock;
pub mod retry;

pub use http::{HttpEmbeddingProvider, HttpGenerator, HttpPdfTextProvider};
pub use mock::{FailingEmbeddingProvider, HashEmbeddingProvider, ScriptedGenerator, TextPassthroughPdfProvider};
pub use retry::{retry_with, RetryConfig, RetryPolicy};
