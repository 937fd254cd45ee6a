pub mod client;
pub mod hub;
pub mod protocol;
pub mod server;

pub use client::GatewayClient;
pub use hub::SessionHub;
pub use server::GatewayServer;
