//! HTTP request handlers for the room service.

pub mod health;
pub mod metrics;
pub mod relay_auth;
pub mod room;
pub mod session;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use relay_auth::relay_auth;
pub use room::{delete_room, get_room, put_room};
pub use session::start_session;
