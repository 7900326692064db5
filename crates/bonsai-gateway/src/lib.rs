//! # Bonsai Sensei Gateway
//! HTTP API over the Q&A agent.
//!
//! - `POST /api/v1/ask` (aliases `/ask`, `/chat`): `{question, top_k?}`
//! - `GET /health`
//! - `GET /api/v1/info`

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
