pub mod client;
pub mod gateway;
pub mod http;
pub mod server;
pub mod wire;

pub use server::{start, AppState, ServerConfig, ServerHandle};
