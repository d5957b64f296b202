pub mod dump;
pub mod hostport;
pub mod server;
pub mod service;
mod tokens;
