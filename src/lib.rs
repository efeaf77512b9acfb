pub mod aggregate;
pub mod artifact;
pub mod catalogue;
pub mod config;
pub mod grid;
pub mod render;
pub mod server;

pub use artifact::Artifact;
pub use config::HexConfig;
