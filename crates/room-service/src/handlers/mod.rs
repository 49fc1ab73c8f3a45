//! HTTP request handlers for the room service.

pub mod health;
pub mod metrics;
pub mod room;
pub mod wait_stream;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use room::open_room;
pub use wait_stream::wait_stream;
