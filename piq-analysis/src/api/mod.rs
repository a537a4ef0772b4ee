//! HTTP API handlers for piq-analysis

pub mod analysis;
pub mod health;
pub mod identity;
pub mod stream;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use identity::AuthenticatedUser;
pub use stream::stream_routes;
