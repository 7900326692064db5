//! # Bonsai Sensei Core
//!
//! Shared building blocks for every crate in the workspace:
//! configuration, the error taxonomy, the knowledge data model,
//! and the provider traits (`Embedder`, `ChatModel`) that the
//! retrieval and answer pipeline is written against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::BonsaiConfig;
pub use error::{BonsaiError, Result};
