//! Farmview API server library.
//!
//! Exposes the building blocks (config, state, routes, WebSocket session
//! machinery, commentary engine, preview conversion) so integration tests
//! and the binary entrypoint can both access them.

pub mod commentary;
pub mod config;
pub mod preview;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
