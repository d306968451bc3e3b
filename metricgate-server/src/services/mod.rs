//! Collaborators of the HTTP server and the server itself.

pub mod auth;
pub mod discards;
pub mod persist;
pub mod publish;
pub mod server;
