pub mod auth;
pub mod schema;
pub mod server;
pub mod snapshot;
