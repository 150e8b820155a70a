//! HTTP API: `/ingest`, `/summarize`, `/chat` and `/health`.

mod error;
mod handlers;
mod router;
mod server;

#[cfg(test)]
mod test_support;

pub use error::GatewayError;
pub use router::build_router;
pub use server::{AppState, GatewayServer};
