//! WebSocket endpoint: message types, connection handling, and the
//! per-connection session state machine.

pub mod handler;
pub mod messages;
pub mod session;

pub use handler::ws_handler;
