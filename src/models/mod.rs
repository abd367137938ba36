pub mod game;
pub mod host;
pub mod server;
