//! HTTP API handlers for audy-server

pub mod channel;
pub mod health;
pub mod import;
pub mod media;
pub mod sse;
pub mod tracks;

pub use channel::channel_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use media::media_routes;
pub use tracks::track_routes;
