//! Trait seams for the external services.

pub mod chat;
pub mod embedder;

pub use chat::{ChatModel, GenerateParams};
pub use embedder::Embedder;
