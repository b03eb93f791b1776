//! Presentation Broker
//!
//! One WebSocket endpoint shared by three kinds of client:
//! - Presenter: owns a session and broadcasts its state
//! - Remote controller: receives state and notes, sends commands
//! - Follower: mirrors the presenter's multiplex snapshots

mod connection;
mod gateway;
mod protocol;
mod role;


pub use connection::BrokerContext;
pub use gateway::handle_broker_ws;
pub use protocol::ServerEvent;
