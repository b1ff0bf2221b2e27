//! Relay WebSocket Layer
//!
//! One task group per connection:
//! - the read loop parses named-event frames and dispatches them
//! - the write loop drains the outbound channel and drives keep-alive pings
//! - `RelayState` holds the peer map and the client registry

pub(crate) mod dispatch;
mod handler;
pub(crate) mod protocol;
mod state;

#[cfg(test)]
mod e2e_tests;

pub use handler::handle_relay_ws;
pub use state::RelayState;
