pub mod health;
pub mod presentations;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, metrics_handler};
pub use presentations::{presentation_files, presentation_index};
pub use websocket::broker_websocket_handler;
